//! Variant key calculation.
//!
//! # Usage
//!
//! ```bash
//! ck-cli key TSHIRT size=M color=red
//! # TSHIRT::color=red|size=M
//! ```

use cartkeeper_core::{SelectedOption, VariantKey, compute_variant_id};

use super::CommandError;

/// Compute the variant key for `product` and `code=value` arguments.
///
/// # Errors
///
/// Returns `CommandError::InvalidOption` for an argument without `=`.
pub fn variant_key(product: &str, options: &[String]) -> Result<VariantKey, CommandError> {
    let options = options
        .iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(code, value)| SelectedOption::new(code, value))
                .ok_or_else(|| CommandError::InvalidOption(arg.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compute_variant_id(product, &options))
}

/// Print the variant key.
///
/// # Errors
///
/// See [`variant_key`].
#[allow(clippy::print_stdout)]
pub fn print(product: &str, options: &[String]) -> Result<(), CommandError> {
    println!("{}", variant_key(product, options)?);
    Ok(())
}
