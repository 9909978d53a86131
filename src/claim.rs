use crate::error::InputError;

/// Validated deposit triple handed to the proving backend.
///
/// Only [`validate`] builds one, so every claim in the system has already
/// passed the input rules. Fields are private; the claim never changes after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositClaim {
    amount: u64,
    term_days: u32,
    tx_hash: Vec<u8>,
}

impl DepositClaim {
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn term_days(&self) -> u32 {
        self.term_days
    }

    /// Raw transaction hash bytes, decoded from hex.
    pub fn tx_hash(&self) -> &[u8] {
        &self.tx_hash
    }
}

/// Parse the three text fields of the deposit form into a [`DepositClaim`].
///
/// Surrounding whitespace is ignored. Amount and term accept ASCII digits
/// only and must fit their integer width; anything larger is rejected rather
/// than truncated. The hash must be non-empty, even-length hex.
pub fn validate(
    amount_text: &str,
    term_text: &str,
    hash_text: &str,
) -> Result<DepositClaim, InputError> {
    let amount = parse_digits::<u64>(amount_text).ok_or(InputError::InvalidAmount)?;
    let term_days = parse_digits::<u32>(term_text).ok_or(InputError::InvalidTerm)?;
    let tx_hash = decode_hash(hash_text)?;

    Ok(DepositClaim {
        amount,
        term_days,
        tx_hash,
    })
}

fn parse_digits<T: std::str::FromStr>(text: &str) -> Option<T> {
    let text = text.trim();
    // `FromStr` for unsigned ints accepts a leading '+'; the form does not.
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn decode_hash(text: &str) -> Result<Vec<u8>, InputError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InputError::InvalidHash);
    }
    hex::decode(text).map_err(|_| InputError::InvalidHash)
}

#[cfg(test)]
pub(crate) fn sample_claim() -> DepositClaim {
    validate("1000", "30", "deadbeef").unwrap()
}
