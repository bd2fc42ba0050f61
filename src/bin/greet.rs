use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use rpcflow_lite::{CallOptions, RpcConnector, RpcRouter, RpcRouterConfig, local_link};
use rpcflow_prototype::greeter::{self, GreeterConfig};
use rpcflow_prototype::proto::greet::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting,
    LongGreetRequest, LongGreetResponse,
};
use tracing::info;

const FIRST_NAMES: [&str; 6] = ["Anthony", "Alex", "Edouard", "Lucy", "Piper", "Sofia"];

fn greeting(first_name: &str) -> Greeting {
    Greeting {
        first_name: first_name.to_string(),
        last_name: "Test".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let (connector, listener) = local_link(16);
    let mut router = RpcRouter::new(RpcRouterConfig::default());
    greeter::register_with(
        &mut router,
        GreeterConfig {
            many_times_interval: Duration::from_millis(200),
            deadline_step: Duration::from_millis(300),
        },
    )?;
    tokio::spawn(router.run(listener));

    run_greet(&connector).await?;
    run_greet_many_times(&connector).await?;
    run_long_greet(&connector).await?;
    run_greet_everyone(&connector).await?;
    // A deadline shorter than the simulated work gets canceled; a longer
    // one succeeds.
    run_greet_with_deadline(&connector, Duration::from_millis(500)).await?;
    run_greet_with_deadline(&connector, Duration::from_secs(2)).await?;

    Ok(())
}

async fn run_greet(connector: &RpcConnector) -> Result<()> {
    let res: GreetResponse = connector
        .unary(
            greeter::GREET,
            GreetRequest {
                greeting: Some(greeting("Anthony")),
            },
            CallOptions::default(),
        )
        .await?;
    info!(result = res.result, "Greet");
    Ok(())
}

async fn run_greet_many_times(connector: &RpcConnector) -> Result<()> {
    let mut stream = connector
        .server_streaming::<_, GreetManyTimesResponse>(
            greeter::GREET_MANY_TIMES,
            GreetManyTimesRequest {
                first_name: "Anthony".to_string(),
                last_name: "SSI YAN KAI".to_string(),
            },
            CallOptions::default(),
        )
        .await?;

    while let Some(item) = stream.next().await {
        let res = item?;
        info!(result = res.result, "GreetManyTimes response");
    }
    Ok(())
}

async fn run_long_greet(connector: &RpcConnector) -> Result<()> {
    let requests = futures::stream::iter(FIRST_NAMES.map(|name| LongGreetRequest {
        first_name: name.to_string(),
    }));
    let res: LongGreetResponse = connector
        .client_streaming(greeter::LONG_GREET, requests, CallOptions::default())
        .await?;
    info!(result = res.result, "LongGreet");
    Ok(())
}

async fn run_greet_everyone(connector: &RpcConnector) -> Result<()> {
    let requests = futures::stream::iter(FIRST_NAMES.map(|name| GreetEveryoneRequest {
        greeting: Some(greeting(name)),
    }));
    let responses: Vec<GreetEveryoneResponse> = connector
        .bidi_streaming(greeter::GREET_EVERYONE, requests, CallOptions::default())
        .await?;
    for res in &responses {
        info!(result = res.result, "GreetEveryone response");
    }
    Ok(())
}

async fn run_greet_with_deadline(connector: &RpcConnector, deadline: Duration) -> Result<()> {
    info!(?deadline, "calling GreetWithDeadline");
    let req = GreetWithDeadlineRequest {
        greeting: Some(greeting("Anthony")),
    };
    match connector
        .unary::<_, GreetWithDeadlineResponse>(
            greeter::GREET_WITH_DEADLINE,
            req,
            CallOptions::default().with_deadline(deadline),
        )
        .await
    {
        Ok(res) => info!(result = res.result, "GreetWithDeadline"),
        Err(status) => info!(code = %status.code(), message = status.message(), "GreetWithDeadline failed"),
    }
    Ok(())
}
