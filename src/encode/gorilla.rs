use std::io::{Error as IoError, ErrorKind, Result, Write};
use tsz::{
    decode::Error,
    stream::{BufferedReader, BufferedWriter},
    DataPoint, Decode, Encode, StdDecoder, StdEncoder,
};

// tsz keeps the delta of deltas in an i32.
const MAX_DELTA: u64 = i32::MAX as u64;

pub fn supports(data_points: &[crate::DataPoint]) -> bool {
    data_points.windows(2).all(|w| {
        w[1].timestamp >= w[0].timestamp && w[1].timestamp - w[0].timestamp <= MAX_DELTA
    })
}

pub fn encode_points<W: Write>(writable: &mut W, data_points: &[crate::DataPoint]) -> Result<()> {
    if data_points.is_empty() {
        return Ok(());
    }
    if !supports(data_points) {
        return Err(IoError::new(
            ErrorKind::InvalidInput,
            "gorilla encoding requires non-decreasing timestamps",
        ));
    }

    let tsz_writer = BufferedWriter::new();
    let mut tsz_encoder = StdEncoder::new(data_points[0].timestamp, tsz_writer);
    for data_point in data_points {
        tsz_encoder.encode(DataPoint::new(data_point.timestamp, data_point.value));
    }
    let bytes = tsz_encoder.close();
    writable.write_all(&bytes)
}

pub fn decode_points(bytes: &[u8], n: usize) -> Result<Vec<crate::DataPoint>> {
    let r = BufferedReader::new(bytes.into());
    let mut decoder = StdDecoder::new(r);

    let mut points = Vec::with_capacity(n);
    while points.len() < n {
        match decoder.next() {
            Ok(dp) => points.push(crate::DataPoint {
                timestamp: dp.get_time(),
                value: dp.get_value(),
            }),
            Err(Error::EndOfStream) => break,
            Err(err) => {
                return Err(IoError::new(
                    ErrorKind::InvalidData,
                    format!("error decoding gorilla stream: {:?}", err),
                ))
            }
        }
    }

    match points.len() == n {
        true => Ok(points),
        false => Err(IoError::new(
            ErrorKind::UnexpectedEof,
            format!("expected {} data points, decoded {}", n, points.len()),
        )),
    }
}
