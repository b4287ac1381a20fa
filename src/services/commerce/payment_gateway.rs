use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::Rng;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

/// A payable registered with the gateway. The client completes payment
/// against `reference` and comes back with a signed [`PaymentConfirmation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayableOrder {
    pub reference: String,
    /// Public key the client uses to open the gateway checkout
    pub client_token: String,
    /// Amount in the currency's minor unit
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

/// Callback payload the client relays after paying.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PaymentConfirmation {
    #[validate(length(min = 1, max = 64))]
    pub order_reference: String,
    #[validate(length(min = 1, max = 64))]
    pub payment_reference: String,
    #[validate(length(min = 1, max = 128))]
    pub signature: String,
}

/// Proof that a confirmation carried a valid gateway signature.
///
/// Only [`PaymentGateway::verify`] implementations inside this crate can
/// build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    order_reference: String,
    payment_reference: String,
}

impl VerifiedPayment {
    pub(crate) fn new(order_reference: String, payment_reference: String) -> Self {
        Self {
            order_reference,
            payment_reference,
        }
    }

    pub fn order_reference(&self) -> &str {
        &self.order_reference
    }

    pub fn payment_reference(&self) -> &str {
        &self.payment_reference
    }
}

/// External payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payable(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<PayableOrder, ServiceError>;

    /// Checks the confirmation signature. Any doubt is a rejection.
    fn verify(&self, confirmation: &PaymentConfirmation) -> Result<VerifiedPayment, ServiceError>;
}

/// Gateway whose confirmations are signed with
/// `hex(HMAC-SHA256(key_secret, "<order_reference>|<payment_reference>"))`.
#[derive(Clone)]
pub struct HmacPaymentGateway {
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for HmacPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacPaymentGateway")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl HmacPaymentGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    fn mac(&self, order_reference: &str, payment_reference: &str) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("Invalid payment key: {}", e)))?;
        mac.update(order_reference.as_bytes());
        mac.update(b"|");
        mac.update(payment_reference.as_bytes());
        Ok(mac)
    }

    /// Signature the gateway attaches to a successful payment.
    pub fn sign(&self, order_reference: &str, payment_reference: &str) -> Result<String, ServiceError> {
        let mac = self.mac(order_reference, payment_reference)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for HmacPaymentGateway {
    async fn create_payable(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
    ) -> Result<PayableOrder, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "payment amount must be positive".to_string(),
            ));
        }
        let amount_minor = (amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("payment amount {} is out of range", amount))
            })?;

        let suffix: u64 = rand::thread_rng().gen();
        Ok(PayableOrder {
            reference: format!("order_{:016x}", suffix),
            client_token: self.key_id.clone(),
            amount_minor,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        })
    }

    fn verify(&self, confirmation: &PaymentConfirmation) -> Result<VerifiedPayment, ServiceError> {
        let signature = hex::decode(confirmation.signature.trim()).map_err(|_| {
            ServiceError::PaymentVerificationError("signature is not valid hex".to_string())
        })?;

        self.mac(&confirmation.order_reference, &confirmation.payment_reference)?
            .verify_slice(&signature)
            .map_err(|_| {
                ServiceError::PaymentVerificationError("signature mismatch".to_string())
            })?;

        Ok(VerifiedPayment::new(
            confirmation.order_reference.clone(),
            confirmation.payment_reference.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn gateway() -> HmacPaymentGateway {
        HmacPaymentGateway::new("key_test_123", "gateway-secret")
    }

    #[tokio::test]
    async fn payable_amount_is_in_minor_units() {
        let payable = gateway()
            .create_payable(dec!(498.50), "INR", "cart-1")
            .await
            .unwrap();
        assert_eq!(payable.amount_minor, 49850);
        assert_eq!(payable.currency, "INR");
        assert_eq!(payable.client_token, "key_test_123");
        assert!(payable.reference.starts_with("order_"));
        assert_eq!(payable.reference.len(), "order_".len() + 16);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        assert_matches!(
            gateway().create_payable(Decimal::ZERO, "INR", "r").await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn valid_signature_verifies() {
        let gw = gateway();
        let signature = gw.sign("order_abc", "pay_xyz").unwrap();
        let verified = gw
            .verify(&PaymentConfirmation {
                order_reference: "order_abc".into(),
                payment_reference: "pay_xyz".into(),
                signature,
            })
            .unwrap();
        assert_eq!(verified.order_reference(), "order_abc");
        assert_eq!(verified.payment_reference(), "pay_xyz");
    }

    #[test]
    fn tampered_confirmation_fails_closed() {
        let gw = gateway();
        let signature = gw.sign("order_abc", "pay_xyz").unwrap();

        assert_matches!(
            gw.verify(&PaymentConfirmation {
                order_reference: "order_abc".into(),
                payment_reference: "pay_other".into(),
                signature: signature.clone(),
            }),
            Err(ServiceError::PaymentVerificationError(_))
        );
        assert_matches!(
            gw.verify(&PaymentConfirmation {
                order_reference: "order_abc".into(),
                payment_reference: "pay_xyz".into(),
                signature: "zz-not-hex".into(),
            }),
            Err(ServiceError::PaymentVerificationError(_))
        );

        let other = HmacPaymentGateway::new("key_test_123", "different-secret");
        assert_matches!(
            other.verify(&PaymentConfirmation {
                order_reference: "order_abc".into(),
                payment_reference: "pay_xyz".into(),
                signature,
            }),
            Err(ServiceError::PaymentVerificationError(_))
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", gateway());
        assert!(!rendered.contains("gateway-secret"));
    }
}
