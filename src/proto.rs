//! Message types for the demo services, hand-derived in the shape
//! `prost-build` would generate for the calculator and greeter protos.

pub mod calculator {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SumRequest {
        #[prost(int32, tag = "1")]
        pub number_1: i32,
        #[prost(int32, tag = "2")]
        pub number_2: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SumResponse {
        #[prost(int32, tag = "1")]
        pub result: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PrimeNumberDecompositionRequest {
        #[prost(int64, tag = "1")]
        pub number: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PrimeNumberDecompositionResponse {
        #[prost(int64, tag = "1")]
        pub number: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ComputeAverageRequest {
        #[prost(double, tag = "1")]
        pub number: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ComputeAverageResponse {
        #[prost(double, tag = "1")]
        pub result: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FindMaximumRequest {
        #[prost(int32, tag = "1")]
        pub number: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FindMaximumResponse {
        #[prost(int32, tag = "1")]
        pub result: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SquareRootRequest {
        #[prost(int32, tag = "1")]
        pub number: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SquareRootResponse {
        #[prost(double, tag = "1")]
        pub result: f64,
    }
}

pub mod greet {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Greeting {
        #[prost(string, tag = "1")]
        pub first_name: String,
        #[prost(string, tag = "2")]
        pub last_name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetRequest {
        #[prost(message, optional, tag = "1")]
        pub greeting: Option<Greeting>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetResponse {
        #[prost(string, tag = "1")]
        pub result: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetManyTimesRequest {
        #[prost(string, tag = "1")]
        pub first_name: String,
        #[prost(string, tag = "2")]
        pub last_name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetManyTimesResponse {
        #[prost(string, tag = "1")]
        pub result: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LongGreetRequest {
        #[prost(string, tag = "1")]
        pub first_name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LongGreetResponse {
        #[prost(string, tag = "1")]
        pub result: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetEveryoneRequest {
        #[prost(message, optional, tag = "1")]
        pub greeting: Option<Greeting>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetEveryoneResponse {
        #[prost(string, tag = "1")]
        pub result: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetWithDeadlineRequest {
        #[prost(message, optional, tag = "1")]
        pub greeting: Option<Greeting>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GreetWithDeadlineResponse {
        #[prost(string, tag = "1")]
        pub result: String,
    }
}
