// Request/response signing for the supported gateways.
//
// Signatures are recomputed locally over the received fields and compared as
// lowercase hex strings; a callback without a signature never verifies.

use std::collections::BTreeMap;
use std::str::FromStr;

use md5::Md5;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Flat string parameters, ordered by key
pub type Params = BTreeMap<String, String>;

/// Signs and verifies gateway parameter maps
pub trait SignatureCodec: Send + Sync {
    /// Name of the field carrying the signature in callbacks
    fn signature_field(&self) -> &'static str;

    /// Compute the signature over `params`
    fn sign(&self, params: &Params) -> String;

    /// Check a callback signature
    ///
    /// The signature field is removed from a copy of `response` before
    /// recomputing. The caller's map is left untouched.
    fn verify(&self, response: &Params) -> bool {
        let Some(received) = response.get(self.signature_field()) else {
            return false;
        };
        if received.is_empty() {
            return false;
        }

        let mut unsigned = response.clone();
        unsigned.remove(self.signature_field());

        self.sign(&unsigned) == *received
    }
}

/// SHA-256 over the sorted query string plus a shared key (FOMO Pay)
#[derive(Clone)]
pub struct SortedParamsSha256 {
    shared_key: String,
}

impl SortedParamsSha256 {
    pub fn new(shared_key: impl Into<String>) -> Self {
        Self {
            shared_key: shared_key.into(),
        }
    }

    /// The exact string that gets hashed
    pub fn signing_string(&self, params: &Params) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}&shared_key={}", query, self.shared_key)
    }
}

impl SignatureCodec for SortedParamsSha256 {
    fn signature_field(&self) -> &'static str {
        "signature"
    }

    fn sign(&self, params: &Params) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_string(params).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Which PayU signature layout to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayuSignatureKind {
    /// Outbound checkout form: `api_key~merchant_id~referenceCode~amount~currency`
    PaymentForm,
    /// Confirmation callback: `api_key~merchant_id~reference_sale~new_value~currency~state_pol`
    Confirmation,
}

/// MD5 over `~`-joined positional fields (PayU)
#[derive(Clone)]
pub struct PayuMd5 {
    api_key: String,
    merchant_id: String,
    kind: PayuSignatureKind,
}

impl PayuMd5 {
    pub fn new(
        api_key: impl Into<String>,
        merchant_id: impl Into<String>,
        kind: PayuSignatureKind,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            merchant_id: merchant_id.into(),
            kind,
        }
    }

    /// The exact string that gets hashed
    pub fn signing_string(&self, params: &Params) -> String {
        let field = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();

        match self.kind {
            PayuSignatureKind::PaymentForm => format!(
                "{}~{}~{}~{}~{}",
                self.api_key,
                self.merchant_id,
                field("referenceCode"),
                field("amount"),
                field("currency"),
            ),
            PayuSignatureKind::Confirmation => format!(
                "{}~{}~{}~{}~{}~{}",
                self.api_key,
                self.merchant_id,
                field("reference_sale"),
                normalize_amount(field("value")),
                field("currency"),
                field("state_pol"),
            ),
        }
    }
}

impl SignatureCodec for PayuMd5 {
    fn signature_field(&self) -> &'static str {
        match self.kind {
            PayuSignatureKind::PaymentForm => "signature",
            PayuSignatureKind::Confirmation => "sign",
        }
    }

    fn sign(&self, params: &Params) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.signing_string(params).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Amount representation PayU signs confirmations with
///
/// The value is read as a two-decimal amount; when the second decimal digit is
/// zero only one decimal is kept. `150.00` and `150.0` give `150.0`, `150.20`
/// gives `150.2`, `150.26` is unchanged. Values that are not decimals are
/// signed as received.
pub fn normalize_amount(value: &str) -> String {
    let Ok(amount) = Decimal::from_str(value.trim()) else {
        return value.to_string();
    };

    let two_decimals = format!("{:.2}", amount.round_dp(2));
    match two_decimals.strip_suffix('0') {
        Some(one_decimal) => one_decimal.to_string(),
        None => two_decimals,
    }
}
