//! Signing domain and signer recovery for signed orders.

use alloy_primitives::{Address, Signature, B256, U256};
use alloy_sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const DOMAIN_NAME: &str = "Hubble";
pub const DOMAIN_VERSION: &str = "2.0";

/// Chain-specific half of the EIP-712 domain. Name and version are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl OrderDomain {
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self { chain_id, verifying_contract }
    }

    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed(DOMAIN_NAME)),
            Some(Cow::Borrowed(DOMAIN_VERSION)),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// Recovers the address that produced `signature` over `digest`.
pub trait SignerRecovery {
    fn recover(&self, digest: B256, signature: &[u8]) -> Option<Address>;
}

/// secp256k1 recovery over a 65 byte `r || s || v` signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaRecovery;

impl SignerRecovery for EcdsaRecovery {
    fn recover(&self, digest: B256, signature: &[u8]) -> Option<Address> {
        let signature = Signature::try_from(signature).ok()?;
        signature.recover_address_from_prehash(&digest).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, hex};

    #[test]
    fn domain_separator_depends_on_chain() {
        let a = OrderDomain::new(321123, Address::with_last_byte(0x22));
        let b = OrderDomain::new(321124, Address::with_last_byte(0x22));
        assert_ne!(a.to_eip712().separator(), b.to_eip712().separator());
        assert_eq!(a.to_eip712().separator(), a.to_eip712().separator());
    }

    #[test]
    fn malformed_signature_recovers_nothing() {
        let recovery = EcdsaRecovery;
        assert_eq!(recovery.recover(B256::ZERO, &[]), None);
        assert_eq!(recovery.recover(B256::ZERO, &[1u8; 12]), None);
        // r = s = 0 is never a valid point
        assert_eq!(recovery.recover(B256::repeat_byte(1), &[0u8; 65]), None);
    }

    // secp256k1 private key 1 signing 0x4242..42 with a fixed nonce, low-s form
    fn key_one_signature(v: u8) -> Vec<u8> {
        let mut signature = Vec::with_capacity(65);
        signature.extend_from_slice(&hex!("bb50e2d89a4ed70663d080659fe0ad4b9bc3e06c17a227433966cb59ceee020d"));
        signature.extend_from_slice(&hex!("315235f06ce62369705024328cab75d193e714d6da7d6d54e9be553e14581a52"));
        signature.push(v);
        signature
    }

    #[test]
    fn recovers_the_signing_address() {
        let recovery = EcdsaRecovery;
        let digest = B256::repeat_byte(0x42);
        let key_one = address!("7e5f4552091a69125d5dfcb7b8c2659029395bdf");

        assert_eq!(recovery.recover(digest, &key_one_signature(28)), Some(key_one));
        // the other parity names a different point, never the signer
        assert_ne!(recovery.recover(digest, &key_one_signature(27)), Some(key_one));
        // same signature over another digest
        assert_ne!(recovery.recover(B256::repeat_byte(0x43), &key_one_signature(28)), Some(key_one));
    }
}
