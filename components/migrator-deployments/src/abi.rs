use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{Constructor, Function, JsonAbi, Param};
use alloy_primitives::{keccak256, I256};

pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Overload of `name` taking exactly `arity` inputs.
pub fn find_function<'a>(abi: &'a JsonAbi, name: &str, arity: usize) -> Option<&'a Function> {
    abi.functions
        .get(name)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
}

pub fn find_constructor(abi: &JsonAbi) -> Option<&Constructor> {
    abi.constructor()
}

fn describe_value(value: &DynSolValue) -> &'static str {
    match value {
        DynSolValue::Address(_) => "address",
        DynSolValue::Uint(..) | DynSolValue::Int(..) => "integer",
        DynSolValue::Bool(_) => "bool",
        DynSolValue::String(_) => "string",
        DynSolValue::Bytes(_) | DynSolValue::FixedBytes(..) => "bytes",
        _ => "composite",
    }
}

/// Narrows a resolved argument to the declared parameter type. Integers and byte strings
/// come out of plans untyped, so their width is only known here.
fn coerce_value(kind: &DynSolType, value: &DynSolValue) -> Result<DynSolValue, String> {
    let mismatch = || {
        format!(
            "expected {}, got {} value",
            kind.sol_type_name(),
            describe_value(value)
        )
    };

    let coerced = match kind {
        DynSolType::Address => match value {
            DynSolValue::Address(_) => value.clone(),
            _ => return Err(mismatch()),
        },
        DynSolType::Bool => match value {
            DynSolValue::Bool(_) => value.clone(),
            _ => return Err(mismatch()),
        },
        DynSolType::String => match value {
            DynSolValue::String(_) => value.clone(),
            _ => return Err(mismatch()),
        },
        DynSolType::Bytes => match value {
            DynSolValue::Bytes(_) => value.clone(),
            _ => return Err(mismatch()),
        },
        DynSolType::Uint(bits) => match value {
            DynSolValue::Uint(number, _) => {
                if number.bit_len() > *bits {
                    return Err(format!("{} does not fit in uint{}", number, bits));
                }
                DynSolValue::Uint(*number, *bits)
            }
            _ => return Err(mismatch()),
        },
        DynSolType::Int(bits) => match value {
            // Top bit is the sign.
            DynSolValue::Uint(number, _) => {
                if number.bit_len() >= *bits {
                    return Err(format!("{} does not fit in int{}", number, bits));
                }
                DynSolValue::Int(I256::from_raw(*number), *bits)
            }
            _ => return Err(mismatch()),
        },
        DynSolType::FixedBytes(size) => match value {
            DynSolValue::Bytes(data) if data.len() == *size => {
                let mut word = alloy_primitives::B256::ZERO;
                word.0[..*size].copy_from_slice(data);
                DynSolValue::FixedBytes(word, *size)
            }
            DynSolValue::Bytes(data) => {
                return Err(format!(
                    "expected {} bytes for bytes{}, got {}",
                    size,
                    size,
                    data.len()
                ))
            }
            _ => return Err(mismatch()),
        },
        _ => return Err(format!("unsupported abi type {}", kind.sol_type_name())),
    };
    Ok(coerced)
}

/// Encodes `values` as the parameter list described by `params`.
pub fn encode_arguments(params: &[Param], values: &[DynSolValue]) -> Result<Vec<u8>, String> {
    if params.len() != values.len() {
        return Err(format!(
            "expected {} argument(s), got {}",
            params.len(),
            values.len()
        ));
    }

    let mut coerced = Vec::with_capacity(values.len());
    for (position, (param, value)) in params.iter().zip(values.iter()).enumerate() {
        let kind = DynSolType::parse(&param.ty)
            .map_err(|_| format!("argument {}: unsupported abi type {}", position + 1, param.ty))?;
        coerced.push(
            coerce_value(&kind, value).map_err(|e| format!("argument {}: {}", position + 1, e))?,
        );
    }
    Ok(DynSolValue::Tuple(coerced).abi_encode_params())
}

pub fn encode_function_call(function: &Function, values: &[DynSolValue]) -> Result<Vec<u8>, String> {
    let mut data = function.selector().to_vec();
    data.extend(encode_arguments(&function.inputs, values)?);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use std::str::FromStr;

    fn abi(json: &str) -> JsonAbi {
        serde_json::from_str(json).unwrap()
    }

    fn params(types: &[&str]) -> Vec<Param> {
        let json = types
            .iter()
            .map(|kind| format!(r#"{{"name":"","type":"{}","internalType":"{}"}}"#, kind, kind))
            .collect::<Vec<_>>()
            .join(",");
        serde_json::from_str(&format!("[{}]", json)).unwrap()
    }

    fn uint(value: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(value), 256)
    }

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(hex::encode(function_selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(function_selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_encode_address_call() {
        let abi = abi(r#"[{"type":"function","name":"setResourceManagerAddress",
            "inputs":[{"name":"rm","type":"address","internalType":"address"}],
            "outputs":[],"stateMutability":"nonpayable"}]"#);
        let function = find_function(&abi, "setResourceManagerAddress", 1).unwrap();
        assert_eq!(function.signature(), "setResourceManagerAddress(address)");

        let address = Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        let data = encode_function_call(function, &[DynSolValue::Address(address)]).unwrap();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &function_selector("setResourceManagerAddress(address)"));
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..], address.as_slice());
    }

    #[test]
    fn test_encode_dynamic_arguments() {
        let encoded = encode_arguments(
            &params(&["uint256", "string"]),
            &[uint(1), DynSolValue::String("hotel".into())],
        )
        .unwrap();
        let expected = [
            "0000000000000000000000000000000000000000000000000000000000000001",
            "0000000000000000000000000000000000000000000000000000000000000040",
            "0000000000000000000000000000000000000000000000000000000000000005",
            "686f74656c000000000000000000000000000000000000000000000000000000",
        ]
        .concat();
        assert_eq!(hex::encode(encoded), expected);
    }

    #[test]
    fn test_encode_full_width_integers() {
        let above_u128 = U256::from(1u8) << 128usize;
        let encoded =
            encode_arguments(&params(&["uint256"]), &[DynSolValue::Uint(above_u128, 256)]).unwrap();
        assert_eq!(
            hex::encode(encoded),
            "0000000000000000000000000000000100000000000000000000000000000000"
        );

        assert!(encode_arguments(&params(&["int8"]), &[uint(127)]).is_ok());
        assert_eq!(
            encode_arguments(&params(&["int8"]), &[uint(128)]).unwrap_err(),
            "argument 1: 128 does not fit in int8"
        );
    }

    #[test]
    fn test_encode_rejects_mismatches() {
        let address = params(&["address"]);
        assert_eq!(
            encode_arguments(&address, &[DynSolValue::Bool(true)]).unwrap_err(),
            "argument 1: expected address, got bool value"
        );
        assert!(encode_arguments(&address, &[]).is_err());

        let small = params(&["uint8"]);
        assert!(encode_arguments(&small, &[uint(255)]).is_ok());
        assert_eq!(
            encode_arguments(&small, &[uint(256)]).unwrap_err(),
            "argument 1: 256 does not fit in uint8"
        );

        let fixed = params(&["bytes4"]);
        assert!(encode_arguments(&fixed, &[DynSolValue::Bytes(vec![1, 2, 3, 4])]).is_ok());
        assert!(encode_arguments(&fixed, &[DynSolValue::Bytes(vec![1, 2])]).is_err());

        let array = params(&["uint256[]"]);
        assert!(encode_arguments(&array, &[uint(1)]).is_err());
    }

    #[test]
    fn test_parse_truffle_abi_entries() {
        let abi = abi(
            r#"[
                {"inputs": [], "stateMutability": "nonpayable", "type": "constructor"},
                {"inputs": [{"internalType": "address", "name": "rm", "type": "address"}],
                 "name": "setResourceManagerAddress", "outputs": [],
                 "stateMutability": "nonpayable", "type": "function"},
                {"anonymous": false, "inputs": [], "name": "Booked", "type": "event"}
            ]"#,
        );
        assert!(find_constructor(&abi).is_some());
        assert!(find_function(&abi, "setResourceManagerAddress", 1).is_some());
        assert!(find_function(&abi, "setResourceManagerAddress", 2).is_none());
        assert!(find_function(&abi, "Booked", 0).is_none());
    }
}
