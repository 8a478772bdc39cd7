use std::path::Path;
use anyhow::{Context, Result};

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Check if file exists
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// Sorted entry names of a directory
pub fn list_dir<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("Failed to list directory: {:?}", path))?
    {
        let entry = entry.with_context(|| format!("Failed to read entry in {:?}", path))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Format number with commas
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

/// Random number utilities
pub mod random {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Create RNG with fixed seed
    pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    /// Draw a fresh seed from OS entropy
    pub fn entropy_seed() -> u64 {
        ChaCha8Rng::from_entropy().next_u64()
    }
}

/// Validation utilities
pub mod validation {
    use anyhow::{bail, Result};

    /// Validate that value lies strictly between `min` and `max`
    pub fn in_range_exclusive<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        name: &str,
    ) -> Result<()> {
        if !(value > min && value < max) {
            bail!("{} must be strictly between {} and {}, got {}", name, min, max, value);
        }
        Ok(())
    }
}
