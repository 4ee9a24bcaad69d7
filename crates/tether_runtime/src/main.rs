//! Tether demo host
//!
//! Boots a JVM through the invocation API, initializes the bridge the way a
//! `JNI_OnLoad` would, then round-trips strings from threads the JVM has
//! never seen.

use anyhow::{anyhow, ensure, Context, Result};
use jni::{InitArgsBuilder, JNIEnv, JNIVersion, JavaVM};
use tether_jni::tether_core::tether_metrics::BridgeEvent;
use tether_jni::{BridgeConfig, BridgeError, ByteBuffer};
use tracing_subscriber::EnvFilter;

const WORKERS: usize = 4;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("Tether demo v{}", tether_jni::tether_core::VERSION);

    let args = InitArgsBuilder::new()
        .version(JNIVersion::V8)
        .option("-Xcheck:jni")
        .build()
        .context("building JVM arguments")?;
    let vm = JavaVM::new(args).context("starting JVM")?;

    // The creating thread is attached by JavaVM::new.
    let env = vm.get_env().context("main thread has no JNIEnv")?.get_raw();
    // SAFETY: both pointers come from the live JVM started above, and `env`
    // belongs to this thread.
    let (handle, env) = unsafe {
        (
            JavaVM::from_raw(vm.get_java_vm_pointer())?,
            JNIEnv::from_raw(env)?,
        )
    };
    tether_jni::initialize_bridge(handle, env, BridgeConfig::from_env()?)?;

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| std::thread::spawn(move || round_trip(i)))
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow!("worker panicked"))??;
    }

    let events = &tether_jni::tether_core::EVENTS;
    tracing::info!(
        attach = events.get(BridgeEvent::Attach),
        detach = events.get(BridgeEvent::Detach),
        drained = events.get(BridgeEvent::ExceptionDrained),
        "bridge traffic"
    );
    Ok(())
}

fn round_trip(worker: usize) -> Result<()> {
    let text = format!("hello from worker {worker}");

    let echoed = tether_jni::with_attachment(|ctx| -> Result<Option<ByteBuffer>, BridgeError> {
        // Provoke an exception so the drain path runs on a foreign thread.
        if ctx.env().find_class("tether/DoesNotExist").is_err() {
            let drained = tether_jni::drain_exceptions(ctx);
            tracing::debug!(worker, drained, "missing class lookup");
        }

        let string = tether_jni::managed_from_native(ctx, Some(text.as_bytes()))?;
        tether_jni::native_from_managed(ctx, &string)
    })??
    .ok_or_else(|| anyhow!("worker {worker}: string came back null"))?;

    ensure!(
        echoed.as_bytes() == text.as_bytes(),
        "worker {worker}: round trip mangled {:?}",
        echoed
    );

    let runtime = tether_jni::get_runtime()?;
    ensure!(
        runtime.vm().get_env().is_err(),
        "worker {worker}: thread still attached after scope"
    );

    tracing::info!(worker, text = echoed.to_str().unwrap_or("<binary>"), "round trip ok");
    tether_jni::release(echoed);
    Ok(())
}
