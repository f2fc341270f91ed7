//! Prime protocol framing, decoding and response encoding.

use bytes::BytesMut;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

/// The only method this protocol answers.
pub const METHOD: &str = "isPrime";

/// Frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Fixed reply to any malformed request, delimiter included.
pub const MALFORMED_RESPONSE: &[u8] = b"{\"answer\":\"Malformed\"}\n";

/// A decoded, validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub number: Number,
}

/// Response to a well-formed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub method: String,
    pub prime: bool,
}

/// Why a frame was rejected. Every variant ends the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("request is not valid UTF-8")]
    InvalidUtf8,
    #[error("request is not valid JSON")]
    InvalidJson,
    #[error("request is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongFieldType(&'static str),
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("request line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// Splits newline-delimited frames off an accumulation buffer.
///
/// Remembers how much of the pending bytes it has already searched, so
/// a long line arriving over many reads is scanned once.
#[derive(Debug)]
pub struct LineFramer {
    scanned: usize,
    max_line_length: usize,
}

impl LineFramer {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            scanned: 0,
            max_line_length,
        }
    }

    /// Split the next complete frame off the front of `buffer`.
    ///
    /// The returned frame excludes the delimiter. Returns `Ok(None)` while
    /// no delimiter has arrived; partial data stays in `buffer`. A frame,
    /// complete or not, longer than `max_line_length` is `LineTooLong`.
    pub fn next_frame(&mut self, buffer: &mut BytesMut) -> Result<Option<BytesMut>, Malformed> {
        let start = self.scanned.min(buffer.len());

        match buffer[start..].iter().position(|&b| b == DELIMITER) {
            Some(offset) => {
                let pos = start + offset;
                self.scanned = 0;
                if pos > self.max_line_length {
                    return Err(Malformed::LineTooLong(self.max_line_length));
                }

                let mut frame = buffer.split_to(pos + 1);
                frame.truncate(pos);
                Ok(Some(frame))
            }
            None => {
                self.scanned = buffer.len();
                if buffer.len() > self.max_line_length {
                    return Err(Malformed::LineTooLong(self.max_line_length));
                }
                Ok(None)
            }
        }
    }
}

/// Decode and validate one frame.
///
/// Fields other than `method` and `number` are ignored.
pub fn decode(frame: &[u8]) -> Result<Request, Malformed> {
    let text = std::str::from_utf8(frame).map_err(|_| Malformed::InvalidUtf8)?;
    let value: Value = serde_json::from_str(text).map_err(|_| Malformed::InvalidJson)?;

    let Value::Object(mut fields) = value else {
        return Err(Malformed::NotAnObject);
    };

    let method = match fields.remove("method") {
        Some(Value::String(method)) => method,
        Some(_) => return Err(Malformed::WrongFieldType("method")),
        None => return Err(Malformed::MissingField("method")),
    };
    if method != METHOD {
        return Err(Malformed::UnknownMethod(method));
    }

    let number = match fields.remove("number") {
        Some(Value::Number(number)) => number,
        Some(_) => return Err(Malformed::WrongFieldType("number")),
        None => return Err(Malformed::MissingField("number")),
    };

    Ok(Request { method, number })
}

/// Compute the response for a validated request.
pub fn respond(request: &Request) -> Response {
    Response {
        method: request.method.clone(),
        prime: is_prime_number(&request.number),
    }
}

/// Append the wire form of `response`, delimiter included, to `output`.
pub fn encode(response: &Response, output: &mut Vec<u8>) -> Result<(), serde_json::Error> {
    serde_json::to_writer(&mut *output, response)?;
    output.push(DELIMITER);
    Ok(())
}

/// Primality of an arbitrary JSON number.
///
/// Negative, non-integral and out-of-range values are never prime.
/// Integral floats such as `7.0` are tested like integers.
pub fn is_prime_number(number: &Number) -> bool {
    if let Some(n) = number.as_u64() {
        return is_prime(n);
    }
    if number.is_i64() {
        return false;
    }

    match number.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => is_prime(f as u64),
        _ => false,
    }
}

const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Deterministic Miller-Rabin, exact for every `u64`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}
