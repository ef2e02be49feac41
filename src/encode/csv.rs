use crate::metric::DataPoint;
use std::io::{BufRead, Error, ErrorKind, Result, Write};

pub fn encode_points<W: Write>(writable: &mut W, data_points: &[DataPoint]) -> Result<()> {
    for data_point in data_points {
        writable
            .write_all(format!("{},{}\n", data_point.timestamp, data_point.value).as_bytes())?;
    }
    Ok(())
}

pub fn decode_points(mut bytes: &[u8], n: usize) -> Result<Vec<DataPoint>> {
    let mut points = Vec::with_capacity(n);
    let mut buf = String::new();
    while points.len() < n {
        buf.clear();
        if bytes.read_line(&mut buf)? == 0 {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("expected {} data points, decoded {}", n, points.len()),
            ));
        }
        points.push(decode_point(buf.trim_end())?);
    }
    Ok(points)
}

fn decode_point(line: &str) -> Result<DataPoint> {
    let (ts, val) = line.split_once(',').ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("expected two columns per line: {:?}", line),
        )
    })?;

    let timestamp: u64 = ts
        .parse()
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
    let value: f64 = val
        .parse()
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    Ok(DataPoint { timestamp, value })
}

#[cfg(test)]
pub mod tests {
    use std::io::{Cursor, Seek, SeekFrom};

    use crate::metric::DataPoint;

    use super::{decode_points, encode_points};

    #[test]
    fn test_encode() {
        let mut file = Cursor::new(Vec::new());
        encode_points(
            &mut file,
            &[DataPoint {
                timestamp: 123,
                value: 1.0,
            }],
        )
        .unwrap();
        assert_eq!(file.into_inner(), b"123,1\n");
    }

    #[test]
    fn test_get_offset() {
        let mut file = Cursor::new(Vec::new());
        encode_points(
            &mut file,
            &[
                DataPoint {
                    timestamp: 123,
                    value: 1.0,
                },
                DataPoint {
                    timestamp: 456,
                    value: 2.5,
                },
            ],
        )
        .unwrap();
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), 14); // "123,1\n456,2.5\n".len()
    }

    #[test]
    fn test_decode() {
        let points = decode_points(b"10,0\n15,0.052\n20,1\n", 3).unwrap();
        assert_eq!(
            points,
            vec![
                DataPoint {
                    timestamp: 10,
                    value: 0.0
                },
                DataPoint {
                    timestamp: 15,
                    value: 0.052
                },
                DataPoint {
                    timestamp: 20,
                    value: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_decode_partial_range() {
        // Only the first n points of a chunk are read.
        let points = decode_points(b"10,0\n15,0.052\n", 1).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_points(b"10,0\n", 2).is_err());
        assert!(decode_points(b"10;0\n", 1).is_err());
        assert!(decode_points(b"-10,0\n", 1).is_err());
        assert!(decode_points(b"10,abc\n", 1).is_err());
    }
}
