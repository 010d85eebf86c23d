use resilience_rs::{codes, CircuitBreaker, ErrorInfo, HookRegistry, Stats};
use std::thread;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let hooks = HookRegistry::new();
    hooks.set_on_transition(|t| println!(">>> circuit {} -> {}", t.from, t.to));

    let breaker = CircuitBreaker::builder()
        .name("external_service")
        .failure_threshold(3)
        .success_threshold(2)
        .half_open_max_requests(2)
        .timeout(Duration::from_secs(1))
        .hooks(hooks)
        .build();

    println!("Circuit initial state: {}", breaker.state());

    let mut attempts = 0u32;
    let mut call_service = || -> resilience_rs::Result<String> {
        attempts += 1;
        // Fail for a while, then recover.
        if (4..=8).contains(&attempts) {
            Err(ErrorInfo::new(503, "External service error").with_module("external_service"))
        } else {
            Ok(format!("response #{}", attempts))
        }
    };

    for i in 1..=15 {
        print!("Attempt {:>2}: ", i);

        match breaker.call(&mut call_service) {
            Ok(result) => println!("succeeded with {}", result),
            Err(err) if err.code() == codes::CIRCUIT_OPEN => {
                println!("rejected, circuit is open");
                thread::sleep(Duration::from_millis(400));
            }
            Err(err) => println!("failed: {}", err),
        }

        thread::sleep(Duration::from_millis(100));
    }

    println!("{}", breaker.to_json());
}
