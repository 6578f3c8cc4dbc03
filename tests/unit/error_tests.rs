//! Unit tests for the application error type.

use syslink_server::AppError;

/// Each variant renders with its domain prefix.
#[test]
fn display_prefixes_each_variant() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Codec("bad".into()), "codec: bad"),
        (AppError::Protocol("bad".into()), "protocol: bad"),
        (AppError::Rpc("bad".into()), "rpc: bad"),
        (AppError::Toolkit("bad".into()), "toolkit: bad"),
        (AppError::Io("bad".into()), "io: bad"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

/// TOML parse failures convert into `AppError::Config`.
#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<toml::Value>("= broken =").expect_err("must not parse");
    let err: AppError = toml_err.into();

    match err {
        AppError::Config(msg) => assert!(
            msg.contains("invalid config"),
            "conversion must add config context, got: {msg}"
        ),
        other => panic!("expected AppError::Config, got: {other:?}"),
    }
}

/// The error type participates in the std error ecosystem.
#[test]
fn implements_std_error() {
    let err = AppError::Rpc("boom".into());
    let dyn_err: &dyn std::error::Error = &err;
    assert_eq!(dyn_err.to_string(), "rpc: boom");
}
