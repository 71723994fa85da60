pub mod response_middleware;
