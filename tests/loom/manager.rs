use loom::sync::atomic::AtomicUsize;
use loom::sync::atomic::Ordering;
use loom::thread;
use splinter::Deferred;
use splinter::UnwaitedFutureManager;
use splinter::error::Exception;
use triomphe::Arc;

struct Probe {
  reaped: Arc<AtomicUsize>,
  awaited: bool,
}

impl Deferred<usize> for Probe {
  fn wait(&mut self) -> Result<usize, Exception> {
    self.awaited = true;
    Ok(self.reaped.fetch_add(1, Ordering::SeqCst))
  }

  fn cancel(&mut self) -> bool {
    false
  }

  fn is_awaited(&self) -> bool {
    self.awaited
  }

  fn is_ready(&mut self) -> bool {
    true
  }
}

fn probe(reaped: &Arc<AtomicUsize>) -> Box<dyn Deferred<usize>> {
  Box::new(Probe {
    reaped: Arc::clone(reaped),
    awaited: false,
  })
}

#[test]
fn schedule_during_flush() {
  loom::model(|| {
    let manager: Arc<UnwaitedFutureManager> = Arc::new(UnwaitedFutureManager::new());
    let reaped: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

    manager.schedule(probe(&reaped));

    let producer = {
      let manager: Arc<UnwaitedFutureManager> = Arc::clone(&manager);
      let reaped: Arc<AtomicUsize> = Arc::clone(&reaped);

      thread::spawn(move || {
        manager.schedule(probe(&reaped));
      })
    };

    let failures: Vec<Exception> = manager.run();
    assert!(failures.is_empty(), "flush reported failures");

    producer.join().unwrap();

    // Whatever the flush missed is still queued.
    let failures: Vec<Exception> = manager.run();
    assert!(failures.is_empty(), "flush reported failures");

    assert!(manager.is_empty(), "queue not drained");
    assert_eq!(reaped.load(Ordering::SeqCst), 2, "future lost");
  });
}

#[test]
fn concurrent_flushes_reap_once() {
  loom::model(|| {
    let manager: Arc<UnwaitedFutureManager> = Arc::new(UnwaitedFutureManager::new());
    let reaped: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

    manager.schedule(probe(&reaped));
    manager.schedule(probe(&reaped));

    let flusher = {
      let manager: Arc<UnwaitedFutureManager> = Arc::clone(&manager);

      thread::spawn(move || {
        let _failures: Vec<Exception> = manager.run();
      })
    };

    let _failures: Vec<Exception> = manager.run();

    flusher.join().unwrap();

    assert_eq!(reaped.load(Ordering::SeqCst), 2, "future reaped twice or lost");
  });
}
