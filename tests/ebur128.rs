#![cfg(target_os = "linux")]

//! Loudness meter scenario; runs only where libebur128 1.2.4 is installed.

use shimforge::{
    Binding, BindingError, Contract, FunctionMember, ImportSpec, LibraryContract,
    LibraryVersion, NativeType, Param, Value,
};

const EBUR128_MODE_I: i32 = (1 << 0) | (1 << 2);

struct Ebur128(Binding);

impl Contract for Ebur128 {
    fn contract() -> LibraryContract {
        LibraryContract::new("Ebur128", "ebur128")
            .version(LibraryVersion::new(1, 2, 4))
            .function(
                FunctionMember::new("Init")
                    .import(ImportSpec::new().entry_point("ebur128_init"))
                    .param(Param::new("channels", NativeType::U32))
                    .param(Param::new("samplerate", NativeType::USize))
                    .param(Param::new("mode", NativeType::I32))
                    .returns(NativeType::Pointer),
            )
            .function(
                FunctionMember::new("Destroy")
                    .import(ImportSpec::new().entry_point("ebur128_destroy"))
                    .param(Param::in_out("state", NativeType::Pointer)),
            )
            .function(
                FunctionMember::new("GetVersion")
                    .import(ImportSpec::new().entry_point("ebur128_get_version"))
                    .param(Param::out("major", NativeType::I32))
                    .param(Param::out("minor", NativeType::I32))
                    .param(Param::out("patch", NativeType::I32)),
            )
    }

    fn from_binding(binding: Binding) -> shimforge::Result<Self> {
        Ok(Self(binding))
    }
}

fn run(binding: shimforge::Result<Ebur128>) {
    let meter = match binding {
        Ok(meter) => meter,
        Err(BindingError::LibraryNotFound { .. }) => return,
        Err(err) => panic!("{err}"),
    };

    let mut version = [Value::I32(0), Value::I32(0), Value::I32(0)];
    let ret = meter.0.call("GetVersion", &mut version).unwrap();
    assert_eq!(ret, Value::Void);
    assert_eq!(version[0], Value::I32(1));
    assert!(matches!(version[1], Value::I32(minor) if minor >= 2));

    let state = meter
        .0
        .call(
            "Init",
            &mut [Value::U32(2), Value::USize(44_100), Value::I32(EBUR128_MODE_I)],
        )
        .unwrap();
    assert!(matches!(state, Value::Pointer(ptr) if !ptr.is_null()));

    let mut args = [state];
    meter.0.call("Destroy", &mut args).unwrap();
    assert!(args[0].is_null_pointer());
}

#[test]
fn test_init_destroy_direct() {
    run(shimforge::create_binding());
}

#[test]
fn test_init_destroy_declared() {
    run(shimforge::create_safe_binding());
}
