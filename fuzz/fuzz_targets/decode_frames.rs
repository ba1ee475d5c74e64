#![no_main]
use libfuzzer_sys::fuzz_target;
use yarp::parser::{ErrorParser, Feed, RequestParser, ResponseParser};
use yarp::{ProtocolError, Request, Response};

fuzz_target!(|data: &[u8]| {
    let _ = Request::decode(&mut &data[..]);
    let _ = Response::decode(&mut &data[..]);
    let _ = ProtocolError::decode(&mut &data[..]);
    let _ = RequestParser::default().feed_slice(data);
    let _ = ResponseParser::default().feed_slice(data);
    let _ = ErrorParser::default().feed_slice(data);
});
