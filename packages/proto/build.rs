fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fds = protox::compile(
        [
            "proto/payments/v1/authorization.proto",
            "proto/payments/v1/events.proto",
            "proto/payments/v1/token.proto",
        ],
        ["proto/"],
    )?;

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_fds(fds)?;

    Ok(())
}
