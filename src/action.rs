//! The action catalog (spec 4.7): one typed operation per JSON action
//! name, dispatched from [`crate::job`]. Every action reads its
//! arguments out of a `serde_json::Value` and returns one back, mirroring
//! the teacher's `set*::run(challenge_number)` dispatch tables (see e.g.
//! `set8/mod.rs`) but keyed by action name instead of challenge number,
//! since a job file addresses operations by name.
//!
//! Field elements and polynomial coefficients cross the JSON boundary as
//! base64-encoded 16-byte GCM blocks, decoded through
//! [`crate::field::bytes_to_field`] — the single bit-order boundary
//! [`crate::field`] documents stays the single boundary here too.

use crate::config::Config;
use crate::crack::{self, Capture};
use crate::error::{CoreError, CoreResult};
use crate::factor;
use crate::field::{self, F};
use crate::gcm;
use crate::padding_oracle;
use crate::poly::Poly;
use crate::rsa_factor;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::time::Duration;

fn arg<'a>(args: &'a Value, key: &str) -> CoreResult<&'a Value> {
    args.get(key).ok_or_else(|| CoreError::Encoding(format!("missing argument \"{key}\"")))
}

fn arg_str<'a>(args: &'a Value, key: &str) -> CoreResult<&'a str> {
    arg(args, key)?.as_str().ok_or_else(|| CoreError::Encoding(format!("argument \"{key}\" must be a string")))
}

fn arg_u64(args: &Value, key: &str) -> CoreResult<u64> {
    arg(args, key)?.as_u64().ok_or_else(|| CoreError::Encoding(format!("argument \"{key}\" must be an unsigned integer")))
}

/// Accepts either base64 or hex, trying base64 first since every action
/// that emits bytes in a reply does so as base64. Some job files in the
/// wild hand-author byte arguments as hex, which is cheaper to eyeball.
fn decode_bytes(key: &str, s: &str) -> CoreResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .or_else(|_| hex::decode(s.trim_start_matches("0x")))
        .map_err(|_| CoreError::Encoding(format!("argument \"{key}\" is neither valid base64 nor valid hex")))
}

fn arg_bytes(args: &Value, key: &str) -> CoreResult<Vec<u8>> {
    decode_bytes(key, arg_str(args, key)?)
}

fn arg_field(args: &Value, key: &str) -> CoreResult<F> {
    field::bytes_to_field(&arg_bytes(args, key)?)
}

fn arg_block(args: &Value, key: &str) -> CoreResult<[u8; 16]> {
    arg_bytes(args, key)?.try_into().map_err(|_| CoreError::Encoding(format!("argument \"{key}\" must be 16 bytes")))
}

/// Coefficient arrays run low-degree first, matching [`Poly::from_coeffs`].
fn poly_from_value(v: &Value) -> CoreResult<Poly> {
    let items = v.as_array().ok_or_else(|| CoreError::Encoding("polynomial must be an array of base64 coefficients".into()))?;
    let coeffs = items
        .iter()
        .map(|c| {
            let s = c.as_str().ok_or_else(|| CoreError::Encoding("coefficient must be a base64 or hex string".into()))?;
            field::bytes_to_field(&decode_bytes("coefficient", s)?)
        })
        .collect::<CoreResult<Vec<F>>>()?;
    Ok(Poly::from_coeffs(coeffs))
}

fn arg_poly(args: &Value, key: &str) -> CoreResult<Poly> {
    poly_from_value(arg(args, key)?)
}

fn field_to_json(f: F) -> Value {
    json!(STANDARD.encode(field::field_to_block(f)))
}

fn block_to_json(block: [u8; 16]) -> Value {
    json!(STANDARD.encode(block))
}

fn poly_to_json(p: &Poly) -> Value {
    json!(p.coeffs().iter().map(|&c| STANDARD.encode(field::field_to_block(c))).collect::<Vec<_>>())
}

/// Run the action named `action`, reading its arguments from `args` and
/// returning its JSON reply. Unknown action names are a [`CoreError::Domain`].
/// `config` supplies ambient per-run defaults (currently just the
/// padding-oracle client's timeout) that a test case's own arguments may
/// still override.
pub fn dispatch(action: &str, args: &Value, config: &Config) -> CoreResult<Value> {
    match action {
        "gfmul" => gfmul(args),
        "gfdiv" => gfdiv(args),
        "gfpoly_add" => gfpoly_add(args),
        "gfpoly_mul" => gfpoly_mul(args),
        "gfpoly_divmod" => gfpoly_divmod(args),
        "gfpoly_pow" => gfpoly_pow(args),
        "gfpoly_powmod" => gfpoly_powmod(args),
        "gfpoly_sort" => gfpoly_sort(args),
        "gfpoly_make_monic" => gfpoly_make_monic(args),
        "gfpoly_sqrt" => gfpoly_sqrt(args),
        "gfpoly_diff" => gfpoly_diff(args),
        "gfpoly_gcd" => gfpoly_gcd(args),
        "gfpoly_factor_sff" => gfpoly_factor_sff(args),
        "gfpoly_factor_ddf" => gfpoly_factor_ddf(args),
        "gfpoly_factor_edf" => gfpoly_factor_edf(args),
        "gcm_encrypt" => gcm_encrypt(args),
        "gcm_decrypt" => gcm_decrypt(args),
        "gcm_crack" => gcm_crack(args),
        "padding_oracle" => padding_oracle_attack(args, config),
        "rsa_factor" => rsa_factor_action(args),
        other => Err(CoreError::Domain(format!("unknown action \"{other}\""))),
    }
}

fn gfmul(args: &Value) -> CoreResult<Value> {
    let a = arg_field(args, "a")?;
    let b = arg_field(args, "b")?;
    Ok(json!({ "product": field_to_json(a.mul(b)) }))
}

fn gfdiv(args: &Value) -> CoreResult<Value> {
    let a = arg_field(args, "a")?;
    let b = arg_field(args, "b")?;
    let (q, r) = a.divmod(b)?;
    Ok(json!({ "quotient": field_to_json(q), "remainder": field_to_json(r) }))
}

fn gfpoly_add(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let b = arg_poly(args, "b")?;
    Ok(json!({ "sum": poly_to_json(&a.add(&b)) }))
}

fn gfpoly_mul(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let b = arg_poly(args, "b")?;
    Ok(json!({ "product": poly_to_json(&a.mul(&b)) }))
}

fn gfpoly_divmod(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let b = arg_poly(args, "b")?;
    let (q, r) = a.divmod(&b)?;
    Ok(json!({ "quotient": poly_to_json(&q), "remainder": poly_to_json(&r) }))
}

fn gfpoly_pow(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let e = arg_u64(args, "exponent")?;
    Ok(json!({ "power": poly_to_json(&a.pow(e)) }))
}

fn gfpoly_powmod(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let m = arg_poly(args, "modulus")?;
    let e_str = arg_str(args, "exponent")?;
    let e: BigUint = e_str.parse().map_err(|_| CoreError::Encoding("\"exponent\" must be a decimal big integer string".into()))?;
    Ok(json!({ "power": poly_to_json(&a.powmod(&e, &m)?) }))
}

fn gfpoly_sort(args: &Value) -> CoreResult<Value> {
    let items = arg(args, "polys")?.as_array().ok_or_else(|| CoreError::Encoding("\"polys\" must be an array".into()))?;
    let polys = items.iter().map(poly_from_value).collect::<CoreResult<Vec<Poly>>>()?;
    Ok(json!({ "sorted": Poly::sort(polys).iter().map(poly_to_json).collect::<Vec<_>>() }))
}

fn gfpoly_make_monic(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    Ok(json!({ "monic": poly_to_json(&a.monic()) }))
}

fn gfpoly_sqrt(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    Ok(json!({ "sqrt": poly_to_json(&a.sqrt()?) }))
}

fn gfpoly_diff(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    Ok(json!({ "diff": poly_to_json(&a.diff()) }))
}

fn gfpoly_gcd(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let b = arg_poly(args, "b")?;
    Ok(json!({ "gcd": poly_to_json(&a.gcd(&b)) }))
}

fn gfpoly_factor_sff(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let factors = factor::sff(&a)?;
    Ok(json!({ "factors": factors.into_iter().map(|(f, e)| json!({ "factor": poly_to_json(&f), "exponent": e })).collect::<Vec<_>>() }))
}

fn gfpoly_factor_ddf(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let groups = factor::ddf(&a)?;
    Ok(json!({ "factors": groups.into_iter().map(|(f, d)| json!({ "factor": poly_to_json(&f), "degree": d })).collect::<Vec<_>>() }))
}

fn gfpoly_factor_edf(args: &Value) -> CoreResult<Value> {
    let a = arg_poly(args, "a")?;
    let degree = arg_u64(args, "degree")? as usize;
    let count = arg_u64(args, "count")? as usize;
    let mut rng = rand::thread_rng();
    let factors = factor::edf(&a, degree, count, &mut rng)?;
    Ok(json!({ "factors": factors.iter().map(poly_to_json).collect::<Vec<_>>() }))
}

fn gcm_encrypt(args: &Value) -> CoreResult<Value> {
    let key: [u8; 16] = arg_block(args, "key")?;
    let nonce = arg_bytes(args, "nonce")?;
    let aad = args.get("aad").map(|_| arg_bytes(args, "aad")).transpose()?.unwrap_or_default();
    let plaintext = arg_bytes(args, "plaintext")?;
    let result = gcm::encrypt(&key, &nonce, &aad, &plaintext);
    Ok(json!({
        "ciphertext": json!(STANDARD.encode(&result.ciphertext)),
        "tag": block_to_json(result.tag),
        "h": field_to_json(result.h),
        "l": block_to_json(result.l),
    }))
}

fn gcm_decrypt(args: &Value) -> CoreResult<Value> {
    let key: [u8; 16] = arg_block(args, "key")?;
    let nonce = arg_bytes(args, "nonce")?;
    let aad = args.get("aad").map(|_| arg_bytes(args, "aad")).transpose()?.unwrap_or_default();
    let ciphertext = arg_bytes(args, "ciphertext")?;
    let tag = arg_block(args, "tag")?;
    let plaintext = gcm::decrypt(&key, &nonce, &aad, &ciphertext, &tag)?;
    Ok(json!({ "plaintext": STANDARD.encode(&plaintext) }))
}

fn capture_from_json(v: &Value) -> CoreResult<Capture> {
    let aad = v.get("aad").map(|_| arg_bytes(v, "aad")).transpose()?.unwrap_or_default();
    let ciphertext = arg_bytes(v, "ciphertext")?;
    let tag = arg_block(v, "tag")?;
    Ok(Capture { aad, ciphertext, tag })
}

fn gcm_crack(args: &Value) -> CoreResult<Value> {
    let c1 = capture_from_json(arg(args, "capture1")?)?;
    let c2 = capture_from_json(arg(args, "capture2")?)?;
    let verify = capture_from_json(arg(args, "verify")?)?;
    let mut rng = StdRng::from_entropy();
    let recovered = crack::recover(&c1, &c2, &verify, &mut rng)?;

    let mut reply = json!({ "h": field_to_json(recovered.h), "mask": field_to_json(recovered.mask) });
    if let Some(forge_args) = args.get("forge") {
        let aad = forge_args.get("aad").map(|_| arg_bytes(forge_args, "aad")).transpose()?.unwrap_or_default();
        let ciphertext = arg_bytes(forge_args, "ciphertext")?;
        let tag = crack::forge(recovered, &aad, &ciphertext);
        reply["forged_tag"] = block_to_json(tag);
    }
    Ok(reply)
}

fn padding_oracle_attack(args: &Value, config: &Config) -> CoreResult<Value> {
    let addr = arg_str(args, "server")?;
    let timeout = args
        .get("timeout_secs")
        .and_then(Value::as_u64)
        .map(Duration::from_secs)
        .unwrap_or(config.oracle_timeout);
    let mut client = padding_oracle::Client::connect(addr, timeout)?;

    let (iv, ciphertext) = match (args.get("iv"), args.get("ciphertext")) {
        (Some(_), Some(_)) => (arg_bytes(args, "iv")?, arg_bytes(args, "ciphertext")?),
        _ => client.issue()?,
    };

    let plaintext = padding_oracle::crack(&mut client, &iv, &ciphertext)?;
    Ok(json!({ "plaintext": STANDARD.encode(&plaintext) }))
}

fn rsa_factor_action(args: &Value) -> CoreResult<Value> {
    let moduli_strs = arg(args, "moduli")?
        .as_array()
        .ok_or_else(|| CoreError::Encoding("\"moduli\" must be an array".into()))?;
    let moduli = moduli_strs
        .iter()
        .map(|v| {
            let s = v.as_str().ok_or_else(|| CoreError::Encoding("each modulus must be a decimal big integer string".into()))?;
            s.parse::<BigUint>().map_err(|_| CoreError::Encoding(format!("\"{s}\" is not a valid big integer")))
        })
        .collect::<CoreResult<Vec<BigUint>>>()?;

    let factored = rsa_factor::factor_via_shared_primes(&moduli)?;
    Ok(json!({
        "factors": factored
            .into_iter()
            .map(|f| match f {
                Some(f) => json!({ "p": f.p.to_string(), "q": f.q.to_string() }),
                None => Value::Null,
            })
            .collect::<Vec<_>>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gfmul_round_trips_through_json() {
        let a = STANDARD.encode(field::field_to_block(F::new(7)));
        let b = STANDARD.encode(field::field_to_block(F::new(2)));
        let result = dispatch("gfmul", &json!({ "a": a, "b": b }), &Config::default()).unwrap();
        let product_bytes = STANDARD.decode(result["product"].as_str().unwrap()).unwrap();
        assert_eq!(field::bytes_to_field(&product_bytes).unwrap(), F::new(7).mul(F::new(2)));
    }

    #[test]
    fn unknown_action_is_a_domain_error() {
        assert!(dispatch("not_a_real_action", &json!({}), &Config::default()).is_err());
    }

    #[test]
    fn gcm_encrypt_then_decrypt_round_trips() {
        let key = STANDARD.encode([0u8; 16]);
        let nonce = STANDARD.encode([0u8; 12]);
        let plaintext = STANDARD.encode(b"hello");
        let enc = dispatch("gcm_encrypt", &json!({ "key": key, "nonce": nonce, "plaintext": plaintext }), &Config::default()).unwrap();

        let dec = dispatch(
            "gcm_decrypt",
            &json!({
                "key": key,
                "nonce": nonce,
                "ciphertext": enc["ciphertext"],
                "tag": enc["tag"],
            }),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(STANDARD.decode(dec["plaintext"].as_str().unwrap()).unwrap(), b"hello");
    }
}
