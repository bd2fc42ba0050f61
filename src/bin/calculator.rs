use anyhow::Result;
use futures::StreamExt;
use rpcflow_lite::{CallOptions, Code, RpcConnector, RpcRouter, RpcRouterConfig, local_link};
use rpcflow_prototype::calculator;
use rpcflow_prototype::proto::calculator::{
    ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
    PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
    SquareRootResponse, SumRequest, SumResponse,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let (connector, listener) = local_link(16);
    let mut router = RpcRouter::new(RpcRouterConfig::default());
    calculator::register(&mut router)?;
    tokio::spawn(router.run(listener));

    run_sum(&connector).await?;
    run_prime_decomposition(&connector).await?;
    run_compute_average(&connector).await?;
    run_find_maximum(&connector).await?;
    run_square_root(&connector).await?;

    Ok(())
}

async fn run_sum(connector: &RpcConnector) -> Result<()> {
    let res: SumResponse = connector
        .unary(
            calculator::SUM,
            SumRequest {
                number_1: 3,
                number_2: 10,
            },
            CallOptions::default(),
        )
        .await?;
    info!(result = res.result, "Sum(3, 10)");
    Ok(())
}

async fn run_prime_decomposition(connector: &RpcConnector) -> Result<()> {
    let mut stream = connector
        .server_streaming::<_, PrimeNumberDecompositionResponse>(
            calculator::PRIME_NUMBER_DECOMPOSITION,
            PrimeNumberDecompositionRequest { number: 120 },
            CallOptions::default(),
        )
        .await?;

    let mut factors = Vec::new();
    while let Some(item) = stream.next().await {
        let res = item?;
        info!(factor = res.number, "prime factor received");
        factors.push(res.number);
    }
    info!(?factors, "PrimeNumberDecomposition(120)");
    Ok(())
}

async fn run_compute_average(connector: &RpcConnector) -> Result<()> {
    let numbers = [1.0, 2.0, 3.0, 4.0];
    let requests = futures::stream::iter(numbers.map(|number| ComputeAverageRequest { number }));
    let res: ComputeAverageResponse = connector
        .client_streaming(calculator::COMPUTE_AVERAGE, requests, CallOptions::default())
        .await?;
    info!(?numbers, average = res.result, "ComputeAverage");
    Ok(())
}

/// Drives the bidi call with a separate send task, logging each new
/// maximum as it arrives.
async fn run_find_maximum(connector: &RpcConnector) -> Result<()> {
    let conn = connector
        .open::<FindMaximumRequest, FindMaximumResponse>(
            calculator::FIND_MAXIMUM,
            CallOptions::default(),
        )
        .await?;
    let (sender, mut receiver) = conn.split();

    let send_task = tokio::spawn(async move {
        for number in [1, 5, 3, 6, 2, 20] {
            info!(number, "sending");
            if sender.send(FindMaximumRequest { number }).await.is_err() {
                return;
            }
        }
        let _ = sender.close_send().await;
    });

    while let Some(item) = receiver.next().await {
        let res = item?;
        info!(maximum = res.result, "current maximum");
    }
    send_task.await?;
    Ok(())
}

async fn run_square_root(connector: &RpcConnector) -> Result<()> {
    for number in [10, -2] {
        match connector
            .unary::<_, SquareRootResponse>(
                calculator::SQUARE_ROOT,
                SquareRootRequest { number },
                CallOptions::default(),
            )
            .await
        {
            Ok(res) => info!(number, result = res.result, "square root"),
            Err(status) if status.code() == Code::InvalidArgument => {
                info!(number, code = %status.code(), message = status.message(), "square root rejected");
            }
            Err(status) => return Err(status.into()),
        }
    }
    Ok(())
}
