//! Length-prefixed framing.
//!
//! Each message is a big-endian `u32` payload length followed by the
//! JSON-encoded payload.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::io::Read;
use std::io::Write;

use crate::consts::FRAME_HEADER_LEN;
use crate::consts::MAX_FRAME_LENGTH;
use crate::error::Exception;

/// Encodes `value` as a single frame and writes it with one `write_all`.
pub(crate) fn write<W, T>(mut writer: W, value: &T) -> Result<(), Exception>
where
  W: Write,
  T: Serialize + ?Sized,
{
  let payload: Vec<u8> = serde_json::to_vec(value)
    .map_err(|error| Exception::transport(format_args!("failed to encode frame: {error}")))?;

  let length: u32 = match u32::try_from(payload.len()) {
    Ok(length) if payload.len() <= MAX_FRAME_LENGTH => length,
    _ => {
      return Err(Exception::syscap(format_args!(
        "frame of {} bytes exceeds the limit of {MAX_FRAME_LENGTH} bytes",
        payload.len(),
      )));
    }
  };

  let mut frame: Vec<u8> = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());

  frame.extend_from_slice(&length.to_be_bytes());
  frame.extend_from_slice(&payload);

  writer
    .write_all(&frame)
    .and_then(|()| writer.flush())
    .map_err(|error| Exception::transport(format_args!("failed to write frame: {error}")))
}

/// Reads exactly one frame and decodes its payload.
pub(crate) fn read<R, T>(mut reader: R) -> Result<T, Exception>
where
  R: Read,
  T: DeserializeOwned,
{
  let mut header: [u8; FRAME_HEADER_LEN] = [0; FRAME_HEADER_LEN];

  match fill(&mut reader, &mut header)? {
    0 => return Err(Exception::transport("channel closed")),
    FRAME_HEADER_LEN => {}
    count => {
      return Err(Exception::transport(format_args!(
        "truncated frame header: {count} of {FRAME_HEADER_LEN} bytes",
      )));
    }
  }

  let length: usize = u32::from_be_bytes(header) as usize;

  if length > MAX_FRAME_LENGTH {
    return Err(Exception::syscap(format_args!(
      "frame of {length} bytes exceeds the limit of {MAX_FRAME_LENGTH} bytes",
    )));
  }

  let mut payload: Vec<u8> = vec![0; length];
  let count: usize = fill(&mut reader, &mut payload)?;

  if count != length {
    return Err(Exception::transport(format_args!(
      "truncated frame: {count} of {length} bytes",
    )));
  }

  serde_json::from_slice(&payload)
    .map_err(|error| Exception::transport(format_args!("failed to decode frame: {error}")))
}

/// Reads until `buffer` is full or end-of-file, returning the bytes read.
fn fill<R>(reader: &mut R, buffer: &mut [u8]) -> Result<usize, Exception>
where
  R: Read,
{
  let mut count: usize = 0;

  while count < buffer.len() {
    match reader.read(&mut buffer[count..]) {
      Ok(0) => break,
      Ok(read) => count += read,
      Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
      Err(error) => {
        return Err(Exception::transport(format_args!("failed to read frame: {error}")));
      }
    }
  }

  Ok(count)
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use crate::channel::frame;
  use crate::error::ExceptionGroup;

  #[test]
  fn test_layout() {
    let mut buffer: Vec<u8> = Vec::new();

    frame::write(&mut buffer, "hi").unwrap();

    assert_eq!(buffer, b"\x00\x00\x00\x04\"hi\"");
  }

  #[test]
  fn test_sequence() {
    let mut buffer: Vec<u8> = Vec::new();

    frame::write(&mut buffer, &1_u32).unwrap();
    frame::write(&mut buffer, &vec![2_u32, 3]).unwrap();

    let mut cursor: Cursor<Vec<u8>> = Cursor::new(buffer);

    assert_eq!(frame::read::<_, u32>(&mut cursor).unwrap(), 1);
    assert_eq!(frame::read::<_, Vec<u32>>(&mut cursor).unwrap(), vec![2, 3]);
  }

  #[test]
  fn test_empty_is_closed() {
    let error = frame::read::<_, u32>(Cursor::new(Vec::new())).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
    assert_eq!(error.error(), "channel closed");
  }

  #[test]
  fn test_truncated_header() {
    let error = frame::read::<_, u32>(Cursor::new(vec![0, 0])).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
  }

  #[test]
  fn test_truncated_payload() {
    let error = frame::read::<_, u32>(Cursor::new(vec![0, 0, 0, 8, b'1'])).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
    assert!(error.error().starts_with("truncated frame"));
  }

  #[test]
  fn test_oversized_header() {
    let error = frame::read::<_, u32>(Cursor::new(vec![0xFF; 4])).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::SysCap);
  }

  #[test]
  fn test_undecodable_payload() {
    let error = frame::read::<_, u32>(Cursor::new(vec![0, 0, 0, 1, b'x'])).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
  }
}
