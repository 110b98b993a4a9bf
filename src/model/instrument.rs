//! Mapping between external security identifiers (`SYMBOL.EXCHANGE`) and the
//! exchange-native instrument codes used on the wire.

use crate::core::error::{BridgeError, Result};
use crate::model::constants::UPPERCASE_EXCHANGES;
use serde::{Deserialize, Serialize};

pub const SECURITY_ID_DELIMITER: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeInstrument {
    pub instrument_id: String,
    /// Second character of the exchange suffix, `None` for one-letter suffixes.
    pub exchange_code: Option<char>,
}

fn split_security_id(sec_id: &str) -> Result<(&str, &str)> {
    match sec_id.split_once(SECURITY_ID_DELIMITER) {
        Some((symbol, exchange))
            if !symbol.is_empty()
                && !exchange.is_empty()
                && !exchange.contains(SECURITY_ID_DELIMITER) =>
        {
            Ok((symbol, exchange))
        }
        _ => Err(BridgeError::MalformedIdentifier(sec_id.to_string())),
    }
}

/// Native instrument code for `sec_id`.
///
/// Zhengzhou (`XZCE`) and CFFEX (`CCFX`) list their contracts in uppercase,
/// every other exchange in lowercase.
pub fn native_instrument_id(sec_id: &str) -> Result<String> {
    let (symbol, exchange) = split_security_id(sec_id)?;
    if UPPERCASE_EXCHANGES
        .iter()
        .any(|prefix| exchange.starts_with(prefix))
    {
        Ok(symbol.to_uppercase())
    } else {
        Ok(symbol.to_lowercase())
    }
}

pub fn exchange_code(sec_id: &str) -> Result<Option<char>> {
    let (_, exchange) = split_security_id(sec_id)?;
    Ok(exchange.chars().nth(1))
}

pub fn to_native(sec_id: &str) -> Result<NativeInstrument> {
    Ok(NativeInstrument {
        instrument_id: native_instrument_id(sec_id)?,
        exchange_code: exchange_code(sec_id)?,
    })
}
