//! [`ManagedRuntime`] over JNI.
//!
//! Threads are attached through the raw invoke interface rather than
//! `JavaVM::attach_current_thread*`, so attachment lifetime is owned by the
//! core's environment registry and the requested version is honoured.

use std::ffi::c_void;
use std::ptr;

use android_launch_core::{
    AbiVersion, BridgeError, BridgeResult, ManagedRuntime, OwnerSlot, RawHandle, UpcallArg,
};
use jni::objects::{GlobalRef, JFieldID, JMethodID, JObject, JString, JValue};
use jni::signature::{Primitive, ReturnType};
use jni::sys::{self, jvalue};
use jni::{JNIEnv, JavaVM};
use tracing::error;

/// Raw `JNIEnv*` for one attached thread.
#[derive(Debug, Clone, Copy)]
pub struct JniEnvPtr(*mut sys::JNIEnv);

pub struct JniRuntime {
    vm: JavaVM,
}

impl JniRuntime {
    pub fn new(vm: JavaVM) -> Self {
        Self { vm }
    }

    fn env(ptr: JniEnvPtr) -> BridgeResult<JNIEnv<'static>> {
        // SAFETY: the registry only hands out environments on the thread that
        // attached them, while that attachment is alive.
        unsafe { JNIEnv::from_raw(ptr.0) }.map_err(|e| BridgeError::ManagedCall(e.to_string()))
    }
}

impl ManagedRuntime for JniRuntime {
    type Env = JniEnvPtr;
    type Object = GlobalRef;
    type Method = JMethodID;

    fn attach_current_thread(&self, version: AbiVersion) -> Result<JniEnvPtr, BridgeError> {
        let vm = self.vm.get_java_vm_pointer();
        let mut env: *mut c_void = ptr::null_mut();
        let mut args = sys::JavaVMAttachArgs {
            version: version.0,
            name: ptr::null_mut(),
            group: ptr::null_mut(),
        };

        // SAFETY: `vm` is the process JavaVM and outlives every thread.
        let attach = unsafe { (**vm).AttachCurrentThread }
            .ok_or_else(|| BridgeError::AttachFailed("AttachCurrentThread unavailable".into()))?;
        // SAFETY: arguments match the JNI invoke interface contract.
        let rc = unsafe { attach(vm, &mut env, (&mut args as *mut sys::JavaVMAttachArgs).cast()) };

        if rc != sys::JNI_OK || env.is_null() {
            return Err(BridgeError::AttachFailed(format!(
                "AttachCurrentThread returned {rc}"
            )));
        }
        Ok(JniEnvPtr(env.cast()))
    }

    fn detach_current_thread(&self, _env: &JniEnvPtr) {
        let vm = self.vm.get_java_vm_pointer();
        // SAFETY: called on the exiting thread that attached.
        unsafe {
            if let Some(detach) = (**vm).DetachCurrentThread {
                detach(vm);
            }
        }
    }

    fn call_void(
        &self,
        env: &JniEnvPtr,
        target: &GlobalRef,
        method: JMethodID,
        args: &[UpcallArg<'_>],
    ) -> Result<(), BridgeError> {
        let mut env = Self::env(*env)?;

        let mut locals: Vec<JString<'static>> = Vec::new();
        let mut values: Vec<jvalue> = Vec::with_capacity(args.len());
        let mut converted = Ok(());
        for arg in args {
            match arg {
                UpcallArg::Str(s) => match env.new_string(*s) {
                    Ok(js) => {
                        values.push(jvalue { l: js.as_raw() });
                        locals.push(js);
                    }
                    Err(e) => {
                        converted = Err(BridgeError::ManagedCall(e.to_string()));
                        break;
                    }
                },
                UpcallArg::Int(i) => values.push(JValue::Int(*i).as_jni()),
            }
        }

        let result = converted.and_then(|()| {
            // SAFETY: `method` was resolved on the owner's class with a
            // signature matching the Upcall argument list, returning void.
            unsafe {
                env.call_method_unchecked(
                    target,
                    method,
                    ReturnType::Primitive(Primitive::Void),
                    &values,
                )
            }
            .map(drop)
            .map_err(|e| BridgeError::ManagedCall(e.to_string()))
        });

        // Native threads never pop a local frame, so transient strings must
        // go before returning.
        for local in locals {
            let _ = env.delete_local_ref(local);
        }
        result
    }

    fn clear_pending_fault(&self, env: &JniEnvPtr) -> bool {
        let Ok(mut env) = Self::env(*env) else {
            return false;
        };
        if !env.exception_check().unwrap_or(false) {
            return false;
        }
        let _ = env.exception_describe();
        let _ = env.exception_clear();
        true
    }
}

/// Clears whatever exception a failed lookup left pending.
pub fn clear_exception(env: &mut JNIEnv<'_>) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

/// The owner's `long` handle field.
pub struct FieldSlot<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    owner: &'a JObject<'local>,
    field: JFieldID,
}

impl<'a, 'local> FieldSlot<'a, 'local> {
    pub fn new(env: &'a mut JNIEnv<'local>, owner: &'a JObject<'local>, field: JFieldID) -> Self {
        Self { env, owner, field }
    }

    pub fn env(&mut self) -> &mut JNIEnv<'local> {
        self.env
    }

    /// Promotes the owner to a global reference.
    pub fn promote_owner(&mut self) -> BridgeResult<GlobalRef> {
        self.env
            .new_global_ref(self.owner)
            .map_err(|e| BridgeError::ManagedCall(e.to_string()))
    }
}

impl OwnerSlot for FieldSlot<'_, '_> {
    fn load(&mut self) -> BridgeResult<RawHandle> {
        // SAFETY: `field` was resolved on the owner class with signature "J".
        let value = unsafe {
            self.env
                .get_field_unchecked(self.owner, self.field, ReturnType::Primitive(Primitive::Long))
        };
        value.and_then(|v| v.j()).map_err(|e| {
            clear_exception(&mut *self.env);
            error!("Failed to read handle field: {e}");
            BridgeError::OwnerSlot(e.to_string())
        })
    }

    fn store(&mut self, handle: RawHandle) -> BridgeResult<()> {
        // SAFETY: as in `load`.
        let result =
            unsafe { self.env.set_field_unchecked(self.owner, self.field, JValue::Long(handle)) };
        result.map_err(|e| {
            clear_exception(&mut *self.env);
            BridgeError::OwnerSlot(e.to_string())
        })
    }
}
