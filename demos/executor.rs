use resilience_rs::{
    combine_results, safe_execute, ErrorInfo, Executor, ExecutorProvider, FnJob, JobHandle,
    ThreadPoolProvider,
};
use std::thread;
use std::time::Duration;

fn main() -> resilience_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let provider = ThreadPoolProvider::new(4);
    let executor = provider.get_executor()?;
    println!("Shared executor with {} workers", executor.worker_count());

    let mut handles: Vec<(String, JobHandle)> = Vec::new();
    for i in 0..4 {
        let name = format!("report-{}", i);
        let handle = executor.execute(FnJob::boxed(name.clone(), move || {
            thread::sleep(Duration::from_millis(50 * i));
            if i == 2 {
                return Err(ErrorInfo::new(404, "report source missing").with_module("reports"));
            }
            Ok(())
        }))?;
        handles.push((name, handle));
    }

    let reminder = executor.execute_delayed(
        FnJob::boxed("reminder", || {
            println!("delayed reminder fired");
            Ok(())
        }),
        Duration::from_millis(300),
    )?;

    let crashing = executor.execute(FnJob::boxed("crashing", || -> resilience_rs::VoidResult {
        panic!("corrupt input")
    }))?;

    println!("{} jobs waiting", executor.pending_tasks());
    for (name, handle) in handles {
        match handle.wait() {
            Ok(()) => println!("{} finished", name),
            Err(err) => println!("{} failed: {}", name, err),
        }
    }
    if let Err(err) = crashing.wait() {
        println!("crashing job: {}", err);
    }
    reminder.wait()?;

    let parsed = safe_execute(|| "42".parse::<i32>().unwrap_or_default(), Some("demo"));
    let pair = combine_results((parsed, Ok::<_, ErrorInfo>("answer")))?;
    println!("combined: {:?}", pair);

    executor.shutdown(true);
    println!("executor running: {}", executor.is_running());
    Ok(())
}
