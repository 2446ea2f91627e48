//! Bus arbitration seen through simulated I2C devices

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use hwio_core::{Context, ErrorKind};
use hwio_hal::{BusError, I2c, IoError};
use hwio_hal_mock::MockPlugin;
use parking_lot::Mutex;

fn context(timeout: Duration) -> Arc<Context> {
    let ctx = Context::builder()
        .properties_text(
            "sensor.type = i2c\n\
             sensor.bus = 1\n\
             sensor.device = 0x48\n\
             display.type = i2c\n\
             display.bus = 1\n\
             display.device = 0x3C\n\
             eeprom.type = i2c\n\
             eeprom.bus = 2\n\
             eeprom.device = 0x50\n",
        )
        .unwrap()
        .add_plugin(MockPlugin::new())
        .bus_timeout(timeout)
        .build()
        .unwrap();
    Arc::new(ctx)
}

fn i2c(ctx: &Context, id: &str) -> Arc<dyn I2c> {
    ctx.create(id).unwrap().into_i2c().unwrap()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "{what} never happened");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Hold bus `bus` for `hold` on another thread; returns once it is held
fn hold_bus(ctx: &Arc<Context>, bus: u8, hold: Duration) -> thread::JoinHandle<()> {
    let held = Arc::new(AtomicBool::new(false));
    let handle = {
        let ctx = Arc::clone(ctx);
        let held = Arc::clone(&held);
        thread::spawn(move || {
            ctx.buses()
                .execute(bus, || {
                    held.store(true, Ordering::SeqCst);
                    thread::sleep(hold);
                    Ok::<_, BusError>(())
                })
                .unwrap();
        })
    };
    wait_until("bus acquisition", || held.load(Ordering::SeqCst));
    handle
}

#[test]
fn test_timeout_while_bus_is_held() {
    let ctx = context(Duration::from_millis(200));
    let sensor = i2c(&ctx, "sensor");
    let holder = hold_bus(&ctx, 1, Duration::from_millis(500));

    let start = Instant::now();
    let err = sensor.write(&[0x00]).unwrap_err();
    let waited = start.elapsed();

    assert!(matches!(
        err,
        IoError::Bus(BusError::Timeout { bus: 1, timeout }) if timeout == Duration::from_millis(200)
    ));
    assert!(waited >= Duration::from_millis(200), "gave up after {waited:?}");
    let message = err.to_string();
    assert!(message.contains("bus 1"), "{message}");
    assert!(message.contains("200ms"), "{message}");
    assert_eq!(hwio_core::Error::from(err).kind(), ErrorKind::BusTimeout);

    holder.join().unwrap();
    // Released after the holder finished
    sensor.write(&[0x00]).unwrap();
}

#[test]
fn test_unbounded_timeout_waits_out_the_holder() {
    let ctx = context(Duration::MAX);
    let sensor = i2c(&ctx, "sensor");
    let holder = hold_bus(&ctx, 1, Duration::from_millis(100));

    sensor.write_register(0x01, &[0x42]).unwrap();
    holder.join().unwrap();
    assert_eq!(sensor.read_register_byte(0x01).unwrap(), 0x42);
}

#[test]
fn test_other_bus_is_unaffected() {
    let ctx = context(Duration::from_millis(200));
    let eeprom = i2c(&ctx, "eeprom");
    let holder = hold_bus(&ctx, 1, Duration::from_millis(300));

    assert!(ctx.buses().arbiter(1).is_locked());
    eeprom.write_register(0, &[1, 2, 3]).unwrap();
    holder.join().unwrap();
}

#[test]
fn test_transactions_never_overlap() {
    let ctx = context(Duration::from_secs(10));
    let intervals = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let intervals = Arc::clone(&intervals);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    ctx.buses()
                        .execute(1, || {
                            let start = Instant::now();
                            thread::sleep(Duration::from_millis(1));
                            intervals.lock().push((start, Instant::now()));
                            Ok::<_, BusError>(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut intervals = intervals.lock().clone();
    assert_eq!(intervals.len(), 60);
    intervals.sort_by_key(|(start, _)| *start);
    for pair in intervals.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlapping transactions");
    }
}

#[test]
fn test_two_handles_to_one_chip() {
    // Both handles drive the same register file from different threads
    let ctx = Context::builder()
        .properties_text(
            "a.type = i2c\na.bus = 1\na.device = 0x20\n\
             b.type = i2c\nb.bus = 1\nb.device = 0x20\n",
        )
        .unwrap()
        .add_plugin(MockPlugin::new())
        .bus_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let ctx = Arc::new(ctx);

    let handles: Vec<_> = [("a", 0x10u8), ("b", 0x80u8)]
        .into_iter()
        .map(|(id, base)| {
            let dev = i2c(&ctx, id);
            thread::spawn(move || {
                for round in 0..200u32 {
                    let value = (round % 250) as u8;
                    let block = [value; 4];
                    dev.write_register(base, &block).unwrap();
                    let mut back = [0u8; 4];
                    dev.read_register(base, &mut back).unwrap();
                    assert_eq!(back, block);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_shutdown_interrupts_waiters() {
    let ctx = context(Duration::from_secs(10));
    let display = i2c(&ctx, "display");
    let holder = hold_bus(&ctx, 1, Duration::from_millis(300));

    let waiter = {
        let display = Arc::clone(&display);
        thread::spawn(move || display.write(&[0x00]))
    };
    let arbiter = ctx.buses().arbiter(1);
    wait_until("waiter queued", || arbiter.waiters() == 1);

    ctx.shutdown().unwrap();
    let err = waiter.join().unwrap().unwrap_err();
    assert!(matches!(err, IoError::Bus(BusError::Interrupted { bus: 1 })));
    assert_eq!(hwio_core::Error::from(err).kind(), ErrorKind::BusInterrupted);

    holder.join().unwrap();
    // The device itself was shut down with the context
    assert!(matches!(display.write(&[0x00]), Err(IoError::Closed(_))));
}
