use rand::Rng;

/// Six-digit numeric verification code, zero-padding never needed since
/// the low bound keeps the first digit nonzero.
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}
