/// Generates a short, opaque, collision-resistant id for a new row.
///
/// Uses `nanoid`, the same generator the distilled TypeScript original
/// reaches for, rather than a UUID — ids here are meant to be short and
/// URL-friendly, not globally unique across systems.
pub fn generate() -> String {
    nanoid::nanoid!(21)
}
