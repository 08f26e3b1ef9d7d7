//! Code-generation boundary.
//!
//! The semantic core never inspects what a backend produces; it only threads
//! the opaque handles back into later calls.

use serde::Serialize;

use crate::ast::Literal;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeHandle(pub u32);

/// Whether a function being emitted has a body the core will check next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunctionBody {
    /// Builtins and synthesized constructors.
    None,
    Checked,
}

pub trait Backend {
    /// Only ever called with concrete types; the core memoizes per signature.
    fn bind_type(&mut self, ty: &Type) -> TypeHandle;
    fn emit_function(&mut self, name: &str, ty: &Type, body: FunctionBody) -> Handle;
    fn emit_param(&mut self, function: Handle, index: usize, name: &str, ty: &Type) -> Handle;
    /// The environment parameter of a closure function.
    fn emit_env(&mut self, function: Handle) -> Handle;
    fn emit_field(&mut self, base: Handle, index: usize, ty: &Type) -> Handle;
    fn emit_call(&mut self, callee: Handle, args: &[Handle]) -> Handle;
    fn emit_constant(&mut self, ty: &Type, literal: &Literal) -> Handle;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackendEvent {
    BindType {
        handle: TypeHandle,
        signature: String,
    },
    Function {
        handle: Handle,
        name: String,
        signature: String,
        has_body: bool,
    },
    Param {
        handle: Handle,
        function: Handle,
        index: usize,
        name: String,
    },
    Env {
        handle: Handle,
        function: Handle,
    },
    Field {
        handle: Handle,
        base: Handle,
        index: usize,
    },
    Call {
        handle: Handle,
        callee: Handle,
        args: Vec<Handle>,
    },
    Constant {
        handle: Handle,
        signature: String,
        literal: String,
    },
}

/// Hands out sequential handles and keeps a log of every request.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u32,
    next_type: u32,
    pub events: Vec<BackendEvent>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Handle {
        self.next_handle += 1;
        Handle(self.next_handle)
    }

    /// Names of emitted functions paired with their signatures, in emission order.
    pub fn functions(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Function {
                    name, signature, ..
                } => Some((name.clone(), signature.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn functions_named(&self, wanted: &str) -> Vec<String> {
        self.functions()
            .into_iter()
            .filter(|(name, _)| name == wanted)
            .map(|(_, signature)| signature)
            .collect()
    }

    pub fn bound_types(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::BindType { signature, .. } => Some(signature.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "events": self.events })
    }
}

impl Backend for RecordingBackend {
    fn bind_type(&mut self, ty: &Type) -> TypeHandle {
        self.next_type += 1;
        let handle = TypeHandle(self.next_type);
        self.events.push(BackendEvent::BindType {
            handle,
            signature: ty.signature().to_string(),
        });
        handle
    }

    fn emit_function(&mut self, name: &str, ty: &Type, body: FunctionBody) -> Handle {
        let handle = self.handle();
        self.events.push(BackendEvent::Function {
            handle,
            name: name.to_string(),
            signature: ty.signature().to_string(),
            has_body: body == FunctionBody::Checked,
        });
        handle
    }

    fn emit_param(&mut self, function: Handle, index: usize, name: &str, _ty: &Type) -> Handle {
        let handle = self.handle();
        self.events.push(BackendEvent::Param {
            handle,
            function,
            index,
            name: name.to_string(),
        });
        handle
    }

    fn emit_env(&mut self, function: Handle) -> Handle {
        let handle = self.handle();
        self.events.push(BackendEvent::Env { handle, function });
        handle
    }

    fn emit_field(&mut self, base: Handle, index: usize, _ty: &Type) -> Handle {
        let handle = self.handle();
        self.events.push(BackendEvent::Field {
            handle,
            base,
            index,
        });
        handle
    }

    fn emit_call(&mut self, callee: Handle, args: &[Handle]) -> Handle {
        let handle = self.handle();
        self.events.push(BackendEvent::Call {
            handle,
            callee,
            args: args.to_vec(),
        });
        handle
    }

    fn emit_constant(&mut self, ty: &Type, literal: &Literal) -> Handle {
        let handle = self.handle();
        let literal = match literal {
            Literal::Int(value) => value.to_string(),
            Literal::Float(value) => value.to_string(),
            Literal::Str(value) => format!("{value:?}"),
            Literal::Bool(value) => value.to_string(),
            Literal::Unit => "()".to_string(),
        };
        self.events.push(BackendEvent::Constant {
            handle,
            signature: ty.signature().to_string(),
            literal,
        });
        handle
    }
}
