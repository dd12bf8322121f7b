//! Managed callback methods and their resolved identifiers.

use crate::error::BridgeError;

/// A method on the managed owner that the dispatcher calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upcall {
    SetMessage,
    OnError,
    SetCurrentPosition,
    OnInitialized,
    OnMediaSizeChanged,
    OnVideoLoaded,
}

impl Upcall {
    pub const ALL: [Upcall; 6] = [
        Upcall::SetMessage,
        Upcall::OnError,
        Upcall::SetCurrentPosition,
        Upcall::OnInitialized,
        Upcall::OnMediaSizeChanged,
        Upcall::OnVideoLoaded,
    ];

    /// Method name on the owner class.
    pub fn name(self) -> &'static str {
        match self {
            Upcall::SetMessage => "setMessage",
            Upcall::OnError => "onError",
            Upcall::SetCurrentPosition => "setCurrentPosition",
            Upcall::OnInitialized => "onGStreamerInitialized",
            Upcall::OnMediaSizeChanged => "onMediaSizeChanged",
            Upcall::OnVideoLoaded => "onVideoLoaded",
        }
    }

    /// JNI type signature.
    pub fn signature(self) -> &'static str {
        match self {
            Upcall::SetMessage => "(Ljava/lang/String;)V",
            Upcall::OnError => "(Ljava/lang/String;I)V",
            Upcall::SetCurrentPosition | Upcall::OnMediaSizeChanged => "(II)V",
            Upcall::OnInitialized | Upcall::OnVideoLoaded => "()V",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Method identifiers for every [`Upcall`], resolved once at class init.
#[derive(Debug, Clone, Copy)]
pub struct MethodTable<M> {
    ids: [M; 6],
}

impl<M: Copy> MethodTable<M> {
    /// Resolves every upcall through `lookup(name, signature)`.
    ///
    /// All six are required. The error names every member that failed, not
    /// just the first.
    pub fn resolve<F>(mut lookup: F) -> Result<Self, BridgeError>
    where
        F: FnMut(&str, &str) -> Option<M>,
    {
        let mut resolved = Vec::with_capacity(Upcall::ALL.len());
        let mut missing = Vec::new();

        for upcall in Upcall::ALL {
            match lookup(upcall.name(), upcall.signature()) {
                Some(id) => resolved.push(id),
                None => missing.push(format!("{}{}", upcall.name(), upcall.signature())),
            }
        }

        if !missing.is_empty() {
            return Err(BridgeError::MissingMembers(missing));
        }

        let ids: [M; 6] = resolved
            .try_into()
            .map_err(|_| BridgeError::MissingMembers(vec!["<upcall table>".into()]))?;
        Ok(Self { ids })
    }

    pub fn get(&self, upcall: Upcall) -> M {
        self.ids[upcall.index()]
    }
}
