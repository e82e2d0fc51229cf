//! ABI encoding of orders.
//!
//! Field structs mirror the order book contract's Solidity declarations so the
//! encoding (and therefore every order hash) matches what the contract computes.

use crate::crypto::OrderDomain;
use crate::order::{BaseOrder, IocOrder, LimitOrder, Order, SignedOrder};
use crate::types::{MarketId, OrderKind, Timestamp};
use alloy_primitives::{Bytes, B256, I256, U256};
use alloy_sol_types::{SolStruct, SolType};

pub mod abi {
    use alloy_sol_types::sol;

    sol! {
        struct LimitOrder {
            uint256 ammIndex;
            address trader;
            int256 baseAssetQuantity;
            uint256 price;
            uint256 salt;
            bool reduceOnly;
            bool postOnly;
        }

        struct IOCOrder {
            uint8 orderType;
            uint256 expireAt;
            uint256 ammIndex;
            address trader;
            int256 baseAssetQuantity;
            uint256 price;
            uint256 salt;
            bool reduceOnly;
        }

        // EIP-712 primary type for signed orders
        struct Order {
            uint8 orderType;
            uint256 expireAt;
            uint256 ammIndex;
            address trader;
            int256 baseAssetQuantity;
            uint256 price;
            uint256 salt;
            bool reduceOnly;
            bool postOnly;
        }

        struct SignedOrder {
            Order order;
            bytes signature;
        }

        struct TypedOrder {
            uint8 orderType;
            bytes encodedOrder;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("abi decode failed: {0}")]
    Abi(String),

    #[error("unknown order type tag {0}")]
    UnknownOrderType(u8),

    #[error("field {0} out of range")]
    OutOfRange(&'static str),
}

fn abi_err(err: alloy_sol_types::Error) -> CodecError {
    CodecError::Abi(err.to_string())
}

fn to_u64(value: U256, field: &'static str) -> Result<u64, CodecError> {
    u64::try_from(value).map_err(|_| CodecError::OutOfRange(field))
}

fn base_from_wire(
    amm_index: U256,
    trader: alloy_primitives::Address,
    base_asset_quantity: I256,
    price: U256,
    salt: U256,
    reduce_only: bool,
) -> Result<BaseOrder, CodecError> {
    Ok(BaseOrder {
        market_id: MarketId(to_u64(amm_index, "ammIndex")?),
        trader,
        base_asset_quantity,
        // prices above i256::MAX come out negative and fail the positivity rule
        price: I256::from_raw(price),
        salt,
        reduce_only,
    })
}

fn signed_to_wire(order: &SignedOrder) -> abi::Order {
    abi::Order {
        orderType: order.order_type,
        expireAt: U256::from(order.expire_at.as_secs()),
        ammIndex: U256::from(order.base.market_id.0),
        trader: order.base.trader,
        baseAssetQuantity: order.base.base_asset_quantity,
        price: order.base.price.into_raw(),
        salt: order.base.salt,
        reduceOnly: order.base.reduce_only,
        postOnly: order.post_only,
    }
}

pub fn encode_limit_order(order: &LimitOrder) -> Vec<u8> {
    let wire = abi::LimitOrder {
        ammIndex: U256::from(order.base.market_id.0),
        trader: order.base.trader,
        baseAssetQuantity: order.base.base_asset_quantity,
        price: order.base.price.into_raw(),
        salt: order.base.salt,
        reduceOnly: order.base.reduce_only,
        postOnly: order.post_only,
    };
    <abi::LimitOrder as SolType>::abi_encode(&wire)
}

pub fn decode_limit_order(data: &[u8]) -> Result<LimitOrder, CodecError> {
    let wire = <abi::LimitOrder as SolType>::abi_decode(data, true).map_err(abi_err)?;
    Ok(LimitOrder {
        base: base_from_wire(
            wire.ammIndex,
            wire.trader,
            wire.baseAssetQuantity,
            wire.price,
            wire.salt,
            wire.reduceOnly,
        )?,
        post_only: wire.postOnly,
    })
}

pub fn encode_ioc_order(order: &IocOrder) -> Vec<u8> {
    let wire = abi::IOCOrder {
        orderType: order.order_type,
        expireAt: U256::from(order.expire_at.as_secs()),
        ammIndex: U256::from(order.base.market_id.0),
        trader: order.base.trader,
        baseAssetQuantity: order.base.base_asset_quantity,
        price: order.base.price.into_raw(),
        salt: order.base.salt,
        reduceOnly: order.base.reduce_only,
    };
    <abi::IOCOrder as SolType>::abi_encode(&wire)
}

pub fn decode_ioc_order(data: &[u8]) -> Result<IocOrder, CodecError> {
    let wire = <abi::IOCOrder as SolType>::abi_decode(data, true).map_err(abi_err)?;
    Ok(IocOrder {
        order_type: wire.orderType,
        expire_at: Timestamp::from_secs(to_u64(wire.expireAt, "expireAt")?),
        base: base_from_wire(
            wire.ammIndex,
            wire.trader,
            wire.baseAssetQuantity,
            wire.price,
            wire.salt,
            wire.reduceOnly,
        )?,
    })
}

pub fn encode_signed_order(order: &SignedOrder) -> Vec<u8> {
    let wire = abi::SignedOrder {
        order: signed_to_wire(order),
        signature: order.signature.clone(),
    };
    <abi::SignedOrder as SolType>::abi_encode(&wire)
}

pub fn decode_signed_order(data: &[u8]) -> Result<SignedOrder, CodecError> {
    let wire = <abi::SignedOrder as SolType>::abi_decode(data, true).map_err(abi_err)?;
    let inner = wire.order;
    Ok(SignedOrder {
        order_type: inner.orderType,
        expire_at: Timestamp::from_secs(to_u64(inner.expireAt, "expireAt")?),
        base: base_from_wire(
            inner.ammIndex,
            inner.trader,
            inner.baseAssetQuantity,
            inner.price,
            inner.salt,
            inner.reduceOnly,
        )?,
        post_only: inner.postOnly,
        signature: wire.signature,
    })
}

pub fn signed_order_digest(order: &SignedOrder, domain: &OrderDomain) -> B256 {
    signed_to_wire(order).eip712_signing_hash(&domain.to_eip712())
}

pub fn encode_typed_order(kind: OrderKind, encoded: &[u8]) -> Vec<u8> {
    let wire = abi::TypedOrder {
        orderType: kind.tag(),
        encodedOrder: Bytes::copy_from_slice(encoded),
    };
    // two top level params, not a wrapped tuple
    <abi::TypedOrder as SolType>::abi_encode_params(&wire)
}

/// Splits a typed envelope into its kind and the raw field encoding.
pub fn decode_typed_order(data: &[u8]) -> Result<(OrderKind, Bytes), CodecError> {
    let wire = <abi::TypedOrder as SolType>::abi_decode_params(data, true).map_err(abi_err)?;
    let kind = OrderKind::from_tag(wire.orderType).ok_or(CodecError::UnknownOrderType(wire.orderType))?;
    Ok((kind, wire.encodedOrder))
}

pub fn decode_order(kind: OrderKind, data: &[u8]) -> Result<Order, CodecError> {
    match kind {
        OrderKind::Limit => decode_limit_order(data).map(Order::Limit),
        OrderKind::Ioc => decode_ioc_order(data).map(Order::Ioc),
        OrderKind::Signed => decode_signed_order(data).map(Order::Signed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::from_i128;
    use alloy_primitives::Address;

    fn base() -> BaseOrder {
        BaseOrder {
            market_id: MarketId(3),
            trader: Address::with_last_byte(0xaa),
            base_asset_quantity: from_i128(-2_000_000_000_000_000_000),
            price: from_i128(1_500_000_000),
            salt: U256::from(99u64),
            reduce_only: true,
        }
    }

    #[test]
    fn typed_envelope_carries_kind() {
        let order = Order::Ioc(IocOrder {
            order_type: OrderKind::Ioc.tag(),
            expire_at: Timestamp::from_secs(1_700_000_000),
            base: base(),
        });
        let envelope = order.encode_typed();
        let (kind, payload) = decode_typed_order(&envelope).unwrap();
        assert_eq!(kind, OrderKind::Ioc);
        assert_eq!(decode_order(kind, &payload).unwrap(), order);
    }

    #[test]
    fn signed_order_keeps_signature() {
        let order = SignedOrder {
            order_type: OrderKind::Signed.tag(),
            expire_at: Timestamp::from_secs(1_700_000_000),
            base: base(),
            post_only: true,
            signature: Bytes::from(vec![7u8; 65]),
        };
        let decoded = decode_signed_order(&encode_signed_order(&order)).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let envelope = encode_typed_order(OrderKind::Limit, &[]);
        let mut tampered = envelope.clone();
        // the tag is the last byte of the first word
        tampered[31] = 9;
        assert_eq!(decode_typed_order(&tampered), Err(CodecError::UnknownOrderType(9)));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(decode_limit_order(&[1, 2, 3]), Err(CodecError::Abi(_))));
        assert!(matches!(decode_typed_order(&[]), Err(CodecError::Abi(_))));
    }

    #[test]
    fn oversized_market_index_is_out_of_range() {
        let wire = abi::LimitOrder {
            ammIndex: U256::MAX,
            trader: Address::ZERO,
            baseAssetQuantity: I256::ONE,
            price: U256::from(1u64),
            salt: U256::ZERO,
            reduceOnly: false,
            postOnly: false,
        };
        let data = <abi::LimitOrder as SolType>::abi_encode(&wire);
        assert_eq!(decode_limit_order(&data), Err(CodecError::OutOfRange("ammIndex")));
    }

    #[test]
    fn huge_price_decodes_negative() {
        let wire = abi::LimitOrder {
            ammIndex: U256::ZERO,
            trader: Address::ZERO,
            baseAssetQuantity: I256::ONE,
            price: U256::MAX,
            salt: U256::ZERO,
            reduceOnly: false,
            postOnly: false,
        };
        let data = <abi::LimitOrder as SolType>::abi_encode(&wire);
        let order = decode_limit_order(&data).unwrap();
        assert!(order.base.price.is_negative());
    }
}
