//! End-to-end coverage of the four interaction patterns: every method of
//! the calculator and greeter services driven over an in-process link.

use std::time::Duration;

use futures::StreamExt;
use rpcflow_lite::{CallOptions, Code, RpcConnector, RpcRouter, RpcRouterConfig, local_link};
use rpcflow_prototype::proto::calculator::{
    ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
    PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
    SquareRootResponse, SumRequest, SumResponse,
};
use rpcflow_prototype::proto::greet::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting,
    LongGreetRequest, LongGreetResponse,
};
use rpcflow_prototype::{calculator, greeter, greeter::GreeterConfig};

fn start_with(config: GreeterConfig) -> RpcConnector {
    let (connector, listener) = local_link(16);
    let mut router = RpcRouter::new(RpcRouterConfig::default());
    calculator::register(&mut router).unwrap();
    greeter::register_with(&mut router, config).unwrap();
    tokio::spawn(router.run(listener));
    connector
}

fn start() -> RpcConnector {
    start_with(GreeterConfig {
        many_times_interval: Duration::from_millis(10),
        deadline_step: Duration::from_millis(100),
    })
}

fn greeting(first_name: &str) -> Option<Greeting> {
    Some(Greeting {
        first_name: first_name.to_string(),
        last_name: "Test".to_string(),
    })
}

#[tokio::test]
async fn sum_adds_two_integers() {
    let connector = start();
    let res: SumResponse = connector
        .unary(
            calculator::SUM,
            SumRequest {
                number_1: 3,
                number_2: 10,
            },
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(res.result, 13);
}

#[tokio::test]
async fn prime_decomposition_streams_factors_in_order() {
    let connector = start();
    let stream = connector
        .server_streaming::<_, PrimeNumberDecompositionResponse>(
            calculator::PRIME_NUMBER_DECOMPOSITION,
            PrimeNumberDecompositionRequest { number: 120 },
            CallOptions::default(),
        )
        .await
        .unwrap();

    let factors: Vec<i64> = stream
        .map(|item| item.unwrap().number)
        .collect::<Vec<_>>()
        .await;
    assert_eq!(factors, vec![2, 2, 2, 3, 5]);
    assert_eq!(factors.iter().product::<i64>(), 120);
}

#[tokio::test]
async fn prime_decomposition_below_two_emits_nothing() {
    let connector = start();
    for number in [0, 1] {
        let stream = connector
            .server_streaming::<_, PrimeNumberDecompositionResponse>(
                calculator::PRIME_NUMBER_DECOMPOSITION,
                PrimeNumberDecompositionRequest { number },
                CallOptions::default(),
            )
            .await
            .unwrap();
        let factors: Vec<_> = stream.collect().await;
        assert!(factors.is_empty(), "expected no factors for {number}");
    }
}

#[tokio::test]
async fn compute_average_divides_sum_by_count() {
    let connector = start();
    let requests =
        futures::stream::iter([1.0, 2.0, 3.0, 4.0].map(|number| ComputeAverageRequest { number }));
    let res: ComputeAverageResponse = connector
        .client_streaming(calculator::COMPUTE_AVERAGE, requests, CallOptions::default())
        .await
        .unwrap();
    assert!((res.result - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn compute_average_of_empty_stream_is_invalid() {
    let connector = start();
    let requests = futures::stream::iter(Vec::<ComputeAverageRequest>::new());
    let err = connector
        .client_streaming::<_, ComputeAverageResponse, _>(
            calculator::COMPUTE_AVERAGE,
            requests,
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn find_maximum_emits_only_new_maxima() {
    let connector = start();
    let requests =
        futures::stream::iter([1, 5, 3, 6, 2, 20].map(|number| FindMaximumRequest { number }));
    let responses: Vec<FindMaximumResponse> = connector
        .bidi_streaming(calculator::FIND_MAXIMUM, requests, CallOptions::default())
        .await
        .unwrap();

    let maxima: Vec<i32> = responses.iter().map(|res| res.result).collect();
    assert_eq!(maxima, vec![5, 6, 20]);
    assert!(maxima.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn square_root_of_ten() {
    let connector = start();
    let res: SquareRootResponse = connector
        .unary(
            calculator::SQUARE_ROOT,
            SquareRootRequest { number: 10 },
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert!((res.result - 10f64.sqrt()).abs() < 1e-9);
}

#[tokio::test]
async fn square_root_of_negative_is_invalid_argument() {
    let connector = start();
    let err = connector
        .unary::<_, SquareRootResponse>(
            calculator::SQUARE_ROOT,
            SquareRootRequest { number: -2 },
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    assert!(err.message().contains("-2"));
}

#[tokio::test]
async fn greet_composes_hello() {
    let connector = start();
    let res: GreetResponse = connector
        .unary(
            greeter::GREET,
            GreetRequest {
                greeting: greeting("Anthony"),
            },
            CallOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(res.result, "Hello Anthony");
}

#[tokio::test(start_paused = true)]
async fn greet_many_times_emits_fixed_count() {
    let connector = start();
    let stream = connector
        .server_streaming::<_, GreetManyTimesResponse>(
            greeter::GREET_MANY_TIMES,
            GreetManyTimesRequest {
                first_name: "Anthony".to_string(),
                last_name: "Test".to_string(),
            },
            CallOptions::default(),
        )
        .await
        .unwrap();

    let responses: Vec<_> = stream.map(|item| item.unwrap().result).collect().await;
    assert_eq!(responses.len(), greeter::GREET_MANY_TIMES_COUNT);
    assert!(responses.iter().all(|r| r == "Hello Anthony"));
}

#[tokio::test]
async fn long_greet_concatenates_in_receive_order() {
    let connector = start();
    let requests = futures::stream::iter(["Anthony", "Alex"].map(|name| LongGreetRequest {
        first_name: name.to_string(),
    }));
    let res: LongGreetResponse = connector
        .client_streaming(greeter::LONG_GREET, requests, CallOptions::default())
        .await
        .unwrap();
    assert_eq!(res.result, "Hello Anthony ! Hello Alex ! ");
}

#[tokio::test]
async fn greet_everyone_responds_per_name() {
    let connector = start();
    let requests =
        futures::stream::iter(["Anthony", "Alex", "Lucy"].map(|name| GreetEveryoneRequest {
            greeting: greeting(name),
        }));
    let responses: Vec<GreetEveryoneResponse> = connector
        .bidi_streaming(greeter::GREET_EVERYONE, requests, CallOptions::default())
        .await
        .unwrap();

    let results: Vec<String> = responses.into_iter().map(|res| res.result).collect();
    assert_eq!(
        results,
        vec!["Hello Anthony! ", "Hello Alex! ", "Hello Lucy! "]
    );
}

#[tokio::test(start_paused = true)]
async fn greet_with_deadline_shorter_than_work_is_canceled() {
    // Three 100ms work steps against a 150ms deadline.
    let connector = start();
    let err = connector
        .unary::<_, GreetWithDeadlineResponse>(
            greeter::GREET_WITH_DEADLINE,
            GreetWithDeadlineRequest {
                greeting: greeting("Anthony"),
            },
            CallOptions::default().with_deadline(Duration::from_millis(150)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Canceled);
}

#[tokio::test(start_paused = true)]
async fn greet_with_deadline_longer_than_work_succeeds() {
    let connector = start();
    let res: GreetWithDeadlineResponse = connector
        .unary(
            greeter::GREET_WITH_DEADLINE,
            GreetWithDeadlineRequest {
                greeting: greeting("Anthony"),
            },
            CallOptions::default().with_deadline(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(res.result, "Hello Anthony!");
}

#[tokio::test]
async fn canceled_server_stream_stops_emitting() {
    let connector = start_with(GreeterConfig {
        many_times_interval: Duration::from_millis(200),
        deadline_step: Duration::from_millis(100),
    });
    let conn = connector
        .open::<GreetManyTimesRequest, GreetManyTimesResponse>(
            greeter::GREET_MANY_TIMES,
            CallOptions::default(),
        )
        .await
        .unwrap();
    conn.send(GreetManyTimesRequest {
        first_name: "Anthony".to_string(),
        last_name: "Test".to_string(),
    })
    .await
    .unwrap();

    let (sender, mut receiver) = conn.split();
    let mut received = 0;
    let mut terminal = None;
    while let Some(item) = receiver.next().await {
        match item {
            Ok(_) => {
                received += 1;
                if received == 2 {
                    sender.cancel().await.unwrap();
                }
            }
            Err(status) => {
                terminal = Some(status);
                break;
            }
        }
    }

    let status = terminal.expect("expected a terminal status");
    assert_eq!(status.code(), Code::Canceled);
    assert!(received < greeter::GREET_MANY_TIMES_COUNT);
}

#[tokio::test]
async fn deadline_terminates_server_stream() {
    let connector = start_with(GreeterConfig {
        many_times_interval: Duration::from_millis(200),
        deadline_step: Duration::from_millis(100),
    });
    let mut stream = connector
        .server_streaming::<_, GreetManyTimesResponse>(
            greeter::GREET_MANY_TIMES,
            GreetManyTimesRequest {
                first_name: "Anthony".to_string(),
                last_name: "Test".to_string(),
            },
            CallOptions::default().with_deadline(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    let mut terminal = None;
    let mut received = 0;
    while let Some(item) = stream.next().await {
        match item {
            Ok(_) => received += 1,
            Err(status) => {
                terminal = Some(status);
                break;
            }
        }
    }

    let status = terminal.expect("expected a terminal status");
    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert!(received < greeter::GREET_MANY_TIMES_COUNT);
}

#[tokio::test]
async fn unknown_method_yields_unknown_status() {
    let connector = start();
    let err = connector
        .unary::<_, SumResponse>(
            "calculator.CalculatorService/Nope",
            SumRequest {
                number_1: 1,
                number_2: 2,
            },
            CallOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Unknown);
    assert!(err.message().contains("calculator.CalculatorService/Nope"));
}

#[tokio::test]
async fn unary_without_a_request_message_is_invalid() {
    let connector = start();
    let conn = connector
        .open::<SumRequest, SumResponse>(calculator::SUM, CallOptions::default())
        .await
        .unwrap();
    conn.close_send().await.unwrap();

    let (_sender, mut receiver) = conn.split();
    let err = receiver.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}
