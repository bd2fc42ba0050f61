//! Greeter service: the greeting family across all four call patterns,
//! including the deadline-aware variant.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use rpcflow_lite::{CallContext, RequestStream, RpcRouter, RpcServerError, Status};

use crate::proto::greet::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting,
    LongGreetRequest, LongGreetResponse,
};

pub const SERVICE: &str = "greet.GreetService";

pub const GREET: &str = "greet.GreetService/Greet";
pub const GREET_MANY_TIMES: &str = "greet.GreetService/GreetManyTimes";
pub const LONG_GREET: &str = "greet.GreetService/LongGreet";
pub const GREET_EVERYONE: &str = "greet.GreetService/GreetEveryone";
pub const GREET_WITH_DEADLINE: &str = "greet.GreetService/GreetWithDeadline";

/// How many responses GreetManyTimes emits.
pub const GREET_MANY_TIMES_COUNT: usize = 10;

/// How many discrete work steps GreetWithDeadline simulates.
const DEADLINE_WORK_STEPS: usize = 3;

/// Pacing knobs for the streaming and deadline-aware greeters. The
/// defaults match the original demo cadence; tests shrink them.
#[derive(Debug, Clone)]
pub struct GreeterConfig {
    /// Delay after each GreetManyTimes response. Demonstration pacing
    /// only, not a correctness requirement.
    pub many_times_interval: Duration,

    /// Duration of one GreetWithDeadline work step.
    pub deadline_step: Duration,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            many_times_interval: Duration::from_secs(1),
            deadline_step: Duration::from_secs(1),
        }
    }
}

fn first_name(greeting: Option<Greeting>) -> String {
    greeting.map(|g| g.first_name).unwrap_or_default()
}

pub fn greet_message(first_name: &str) -> String {
    format!("Hello {first_name}")
}

pub fn long_greet_fragment(first_name: &str) -> String {
    format!("Hello {first_name} ! ")
}

pub fn greet_everyone_message(first_name: &str) -> String {
    format!("Hello {first_name}! ")
}

pub fn deadline_greeting(first_name: &str) -> String {
    format!("Hello {first_name}!")
}

/// Register every greeter method with the default pacing.
pub fn register(router: &mut RpcRouter) -> Result<(), RpcServerError> {
    register_with(router, GreeterConfig::default())
}

/// Register every greeter method on the router.
pub fn register_with(router: &mut RpcRouter, config: GreeterConfig) -> Result<(), RpcServerError> {
    router.register_unary(GREET, |_ctx, req: GreetRequest| async move {
        Ok(GreetResponse {
            result: greet_message(&first_name(req.greeting)),
        })
    })?;

    let interval = config.many_times_interval;
    router.register_server_stream(
        GREET_MANY_TIMES,
        move |_ctx, req: GreetManyTimesRequest| async move {
            Ok(stream! {
                for _ in 0..GREET_MANY_TIMES_COUNT {
                    yield Ok(GreetManyTimesResponse {
                        result: greet_message(&req.first_name),
                    });
                    tokio::time::sleep(interval).await;
                }
            })
        },
    )?;

    router.register_client_stream(
        LONG_GREET,
        |_ctx, mut requests: RequestStream<LongGreetRequest>| async move {
            let mut result = String::new();
            while let Some(req) = requests.next().await {
                result.push_str(&long_greet_fragment(&req.first_name));
            }
            Ok(LongGreetResponse { result })
        },
    )?;

    router.register_bidi(
        GREET_EVERYONE,
        |_ctx, mut requests: RequestStream<GreetEveryoneRequest>| async move {
            Ok(stream! {
                while let Some(req) = requests.next().await {
                    yield Ok(GreetEveryoneResponse {
                        result: greet_everyone_message(&first_name(req.greeting)),
                    });
                }
            })
        },
    )?;

    let step = config.deadline_step;
    router.register_unary(
        GREET_WITH_DEADLINE,
        move |ctx: CallContext, req: GreetWithDeadlineRequest| async move {
            for _ in 0..DEADLINE_WORK_STEPS {
                // Cooperative check before each unit of simulated work.
                if ctx.is_cancelled() {
                    tracing::info!(call_id = %ctx.id(), "client canceled request");
                    return Err(Status::canceled("client canceled request"));
                }
                tokio::time::sleep(step).await;
            }
            Ok(GreetWithDeadlineResponse {
                result: deadline_greeting(&first_name(req.greeting)),
            })
        },
    )?;

    Ok(())
}
