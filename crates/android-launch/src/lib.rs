//! Android entry points for the launch bridge.
//!
//! `JNI_OnLoad` registers the activity's native methods and builds the
//! process-wide [`BridgeContext`]. Each native method reads the activity's
//! `native_app_data` field and forwards to [`Bridge`]; an activity without a
//! live bridge turns every command into a no-op.

pub mod safety;

#[cfg(target_os = "android")]
pub mod jni_runtime;
#[cfg(target_os = "android")]
pub mod launch_remote;
#[cfg(target_os = "android")]
pub mod logging;
#[cfg(target_os = "android")]
pub mod window;

#[cfg(target_os = "android")]
pub use android::JNI_OnLoad;

#[cfg(target_os = "android")]
mod android {
    use std::ffi::c_void;
    use std::sync::{Arc, OnceLock};

    use android_launch_core::{
        Bridge, BridgeConfig, BridgeContext, BridgeError, BridgeResult, DurableRef, OwnerSlot,
    };
    use jni::objects::{JClass, JFieldID, JObject, JString};
    use jni::sys::{jboolean, jint, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_4};
    use jni::{JNIEnv, JavaVM, NativeMethod};
    use tracing::{debug, error, info, warn};

    use crate::jni_runtime::{clear_exception, FieldSlot, JniRuntime};
    use crate::launch_remote::{LaunchRemote, LaunchRemoteFactory};
    use crate::logging;
    use crate::safety::{boundary_or, jni_boundary};
    use crate::window::AndroidWindow;

    type AndroidBridge = Bridge<LaunchRemote, JniRuntime>;

    struct AndroidState {
        context: Arc<BridgeContext<JniRuntime>>,
        handle_field: OnceLock<JFieldID>,
    }

    static STATE: OnceLock<AndroidState> = OnceLock::new();

    /// Runs a command against the calling activity's bridge.
    ///
    /// Before `nativeClassInit` has resolved the handle field there can be no
    /// bridge, so the command is dropped.
    fn command<'local, F>(env: &mut JNIEnv<'local>, thiz: &JObject<'local>, entry: &str, f: F)
    where
        F: FnOnce(&mut FieldSlot<'_, 'local>) -> BridgeResult<()>,
    {
        jni_boundary(entry, || {
            let Some(field) = STATE.get().and_then(|s| s.handle_field.get().copied()) else {
                return Ok(());
            };
            let mut slot = FieldSlot::new(env, thiz, field);
            f(&mut slot)
        })
    }

    extern "system" fn native_init<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        jni_boundary("nativeInit", || {
            let state = STATE.get().ok_or(BridgeError::NotRegistered)?;
            let field = state
                .handle_field
                .get()
                .copied()
                .ok_or(BridgeError::NotRegistered)?;
            let mut slot = FieldSlot::new(&mut env, &thiz, field);
            let owner = DurableRef::new(slot.promote_owner()?);
            AndroidBridge::init(&state.context, &LaunchRemoteFactory, owner, &mut slot)
        })
    }

    extern "system" fn native_finalize<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        command(&mut env, &thiz, "nativeFinalize", |slot| AndroidBridge::finalize(slot));
    }

    extern "system" fn native_play<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        command(&mut env, &thiz, "nativePlay", |slot| AndroidBridge::play(slot));
    }

    extern "system" fn native_pause<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        command(&mut env, &thiz, "nativePause", |slot| AndroidBridge::pause(slot));
    }

    extern "system" fn native_stop<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        command(&mut env, &thiz, "nativeStop", |slot| AndroidBridge::stop(slot));
    }

    fn read_string(slot: &mut FieldSlot<'_, '_>, value: &JString<'_>) -> BridgeResult<String> {
        slot.env()
            .get_string(value)
            .map(String::from)
            .map_err(|e| BridgeError::ManagedCall(e.to_string()))
    }

    extern "system" fn native_set_uri<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
        uri: JString<'local>,
    ) {
        command(&mut env, &thiz, "nativeSetUri", |slot| {
            let uri = read_string(slot, &uri)?;
            AndroidBridge::set_uri(slot, &uri)
        });
    }

    extern "system" fn native_set_username<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
        username: JString<'local>,
    ) {
        command(&mut env, &thiz, "nativeSetUsername", |slot| {
            let username = read_string(slot, &username)?;
            AndroidBridge::set_username(slot, &username)
        });
    }

    extern "system" fn native_set_password<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
        password: JString<'local>,
    ) {
        command(&mut env, &thiz, "nativeSetPassword", |slot| {
            let password = read_string(slot, &password)?;
            AndroidBridge::set_password(slot, &password)
        });
    }

    extern "system" fn native_set_tcp_timeout<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
        timeout: jint,
    ) {
        command(&mut env, &thiz, "nativeSetTcpTimeout", |slot| {
            AndroidBridge::set_timeout(slot, timeout)
        });
    }

    extern "system" fn native_request_sample<'local>(mut env: JNIEnv<'local>, thiz: JObject<'local>) {
        command(&mut env, &thiz, "nativeRequestSample", |slot| {
            AndroidBridge::request_sample(slot).map(drop)
        });
    }

    extern "system" fn native_surface_init<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
        surface: JObject<'local>,
    ) {
        command(&mut env, &thiz, "nativeSurfaceInit", |slot| {
            if slot.load()? == 0 {
                return Ok(());
            }
            let Some(window) = AndroidWindow::from_surface(slot.env(), &surface) else {
                warn!("Surface has no native window, keeping the current one");
                return Ok(());
            };
            AndroidBridge::surface_init(slot, window)
        });
    }

    extern "system" fn native_surface_finalize<'local>(
        mut env: JNIEnv<'local>,
        thiz: JObject<'local>,
    ) {
        command(&mut env, &thiz, "nativeSurfaceFinalize", |slot| {
            AndroidBridge::surface_finalize(slot)
        });
    }

    extern "system" fn native_class_init<'local>(
        mut env: JNIEnv<'local>,
        klass: JClass<'local>,
    ) -> jboolean {
        boundary_or("nativeClassInit", JNI_FALSE, || {
            let Some(state) = STATE.get() else {
                return JNI_FALSE;
            };
            match class_init(&mut env, &klass, state) {
                Ok(()) => JNI_TRUE,
                Err(e) => {
                    // Logging may not be routed yet.
                    logging::write_raw(
                        &state.context.config().log_tag,
                        "The calling class does not implement all necessary interface methods",
                    );
                    error!("{e}");
                    JNI_FALSE
                }
            }
        })
    }

    fn class_init<'local>(
        env: &mut JNIEnv<'local>,
        klass: &JClass<'local>,
        state: &AndroidState,
    ) -> BridgeResult<()> {
        let config = state.context.config();

        let field = match env.get_field_id(klass, config.handle_field.as_str(), "J") {
            Ok(field) => Some(field),
            Err(_) => {
                clear_exception(env);
                None
            }
        };

        let resolved = state.context.class_init(|name, signature| {
            match env.get_method_id(klass, name, signature) {
                Ok(id) => Some(id),
                Err(_) => {
                    clear_exception(env);
                    None
                }
            }
        });
        let mut missing = match resolved {
            Ok(()) => Vec::new(),
            Err(BridgeError::MissingMembers(missing)) => missing,
            Err(e) => return Err(e),
        };

        match field {
            Some(field) => {
                let _ = state.handle_field.set(field);
            }
            None => missing.push(format!("{}J", config.handle_field)),
        }

        if missing.is_empty() {
            debug!("Resolved handle field and callback methods");
            Ok(())
        } else {
            Err(BridgeError::MissingMembers(missing))
        }
    }

    fn native_methods() -> Vec<NativeMethod> {
        let method = |name: &str, sig: &str, fn_ptr: *mut c_void| NativeMethod {
            name: name.into(),
            sig: sig.into(),
            fn_ptr,
        };
        vec![
            method("nativeInit", "()V", native_init as *mut c_void),
            method("nativeFinalize", "()V", native_finalize as *mut c_void),
            method("nativePlay", "()V", native_play as *mut c_void),
            method("nativePause", "()V", native_pause as *mut c_void),
            method("nativeStop", "()V", native_stop as *mut c_void),
            method(
                "nativeSurfaceInit",
                "(Ljava/lang/Object;)V",
                native_surface_init as *mut c_void,
            ),
            method("nativeSurfaceFinalize", "()V", native_surface_finalize as *mut c_void),
            method("nativeClassInit", "()Z", native_class_init as *mut c_void),
            method("nativeSetUri", "(Ljava/lang/String;)V", native_set_uri as *mut c_void),
            method(
                "nativeSetUsername",
                "(Ljava/lang/String;)V",
                native_set_username as *mut c_void,
            ),
            method(
                "nativeSetPassword",
                "(Ljava/lang/String;)V",
                native_set_password as *mut c_void,
            ),
            method("nativeSetTcpTimeout", "(I)V", native_set_tcp_timeout as *mut c_void),
            method("nativeRequestSample", "()V", native_request_sample as *mut c_void),
        ]
    }

    fn register_natives(env: &mut JNIEnv<'_>, owner_class: &str) -> BridgeResult<()> {
        let class = env.find_class(owner_class).map_err(|e| {
            clear_exception(env);
            BridgeError::MissingMembers(vec![format!("{owner_class}: {e}")])
        })?;
        let methods = native_methods();
        // SAFETY: every function pointer matches its declared JNI signature.
        unsafe { env.register_native_methods(&class, &methods) }.map_err(|e| {
            clear_exception(env);
            BridgeError::ManagedCall(format!("RegisterNatives failed: {e}"))
        })
    }

    /// Library initializer.
    ///
    /// Returns `JNI_VERSION_1_4`, or `0` to fail the load.
    #[no_mangle]
    #[allow(non_snake_case)]
    pub extern "system" fn JNI_OnLoad(vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
        boundary_or("JNI_OnLoad", 0, || {
            let config = BridgeConfig::default();

            // SAFETY: the VM passes its own valid JavaVM pointer.
            let vm = match unsafe { JavaVM::from_raw(vm) } {
                Ok(vm) => vm,
                Err(_) => {
                    logging::write_raw(&config.log_tag, "Could not retrieve JavaVM");
                    return 0;
                }
            };

            {
                let mut env = match vm.get_env() {
                    Ok(env) => env,
                    Err(_) => {
                        logging::write_raw(&config.log_tag, "Could not retrieve JNIEnv");
                        return 0;
                    }
                };

                logging::init(&config);

                if let Err(e) = register_natives(&mut env, &config.owner_class) {
                    error!("{e}");
                    return 0;
                }
            }

            let context = BridgeContext::new(Arc::new(JniRuntime::new(vm)), config);
            let state = AndroidState {
                context,
                handle_field: OnceLock::new(),
            };
            if STATE.set(state).is_err() {
                warn!("JNI_OnLoad ran twice, keeping the first context");
            }

            info!("Registered native methods");
            JNI_VERSION_1_4
        })
    }
}
