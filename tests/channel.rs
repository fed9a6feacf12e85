use std::time::Duration;

use splinter::Channel;
use splinter::Environment;
use splinter::Promise;
use splinter::ReadableChannel;
use splinter::Runtime;
use splinter::WritableChannel;
use splinter::error::ExceptionGroup;
use splinter::select;
use splinter::wait;

#[test]
fn test_stream_from_child() {
  let env: Environment = Environment::new(Runtime::Fork);
  let (writer, reader): (WritableChannel, ReadableChannel) =
    Channel::new().unwrap().split().unwrap();

  let promise: Promise<usize> = env.spawn(move || {
    for index in 0..3_usize {
      writer.send(&format!("m{index}"))?;
    }

    Ok(3)
  });

  assert_eq!(reader.recv::<String>().unwrap(), "m0");
  assert_eq!(reader.recv::<String>().unwrap(), "m1");
  assert_eq!(reader.recv::<String>().unwrap(), "m2");
  assert_eq!(wait(promise).unwrap(), 3);

  // Every copy of the send end is gone.
  let error = reader.recv::<String>().unwrap_err();

  assert_eq!(error.group(), ExceptionGroup::Transport);
  assert_eq!(error.error(), "channel closed");
}

#[test]
fn test_select_child_writer() {
  let env: Environment = Environment::new(Runtime::Fork);
  let idle: Channel = Channel::new().unwrap();
  let busy: Channel = Channel::new().unwrap();
  let sender: Channel = busy.try_clone().unwrap();

  let promise: Promise<()> = env.spawn(move || sender.send(&42_u64));

  assert_eq!(select(&[&idle, &busy], Some(Duration::from_secs(10))).unwrap(), Some(1));
  assert_eq!(busy.recv::<u64>().unwrap(), 42);

  wait(promise).unwrap();
}

#[test]
fn test_closed_view() {
  let (mut writer, mut reader): (WritableChannel, ReadableChannel) =
    Channel::new().unwrap().split().unwrap();

  writer.close();
  reader.close();

  assert!(writer.is_closed());
  assert!(reader.is_closed());
  assert_eq!(writer.send(&1).unwrap_err().group(), ExceptionGroup::SysInv);
  assert_eq!(reader.recv::<i32>().unwrap_err().group(), ExceptionGroup::SysInv);
}
