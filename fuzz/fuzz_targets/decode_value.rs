#![no_main]
use libfuzzer_sys::fuzz_target;
use yarp::decode::decode_any;
use yarp::encode::encode_value;
use yarp::parser::{Feed, ValueParser};

// The incremental parser and the slice decoder must agree on every input. Values are compared
// re-encoded, so NaN floats compare equal.
fuzz_target!(|data: &[u8]| {
    let direct = decode_any(&mut &data[..]);
    let mut parser = ValueParser::default();
    let parsed = parser.feed_slice(data);
    if let (Ok(v), Ok(Some((p, _)))) = (&direct, &parsed) {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encode_value(&mut a, v).unwrap();
        encode_value(&mut b, p).unwrap();
        assert_eq!(a, b);
    }
});
