//! Function calls: overload resolution, argument conversion and either a
//! native call instruction or inline generation.

use crate::ast::NodeId;
use crate::diagnostic::ErrorKind;
use crate::function::{FunctionEmitter, FunctionImpl, GenerationError, MatchTier};
use crate::ir::Operand;
use crate::registry::TargetKind;
use crate::types::Ty;

use super::CodeGenerator;

impl CodeGenerator<'_> {
    pub(crate) fn call(&mut self, id: NodeId, name: &str, args: &[NodeId]) -> Option<Operand> {
        let functions = self.ctx.functions;
        let Some(group) = functions.get(name) else {
            self.error(
                ErrorKind::FunctionResolution(MatchTier::None),
                id,
                format!("unknown function '{}'", name),
            );
            return None;
        };
        if group.is_volume_only() && self.ctx.registry.target() == TargetKind::Points {
            self.error(
                ErrorKind::Semantic,
                id,
                format!("'{}' is only available in volume programs", name),
            );
            return None;
        }

        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push(self.expr(arg)?);
        }
        let types: Vec<Ty> = values.iter().map(|v| v.ty).collect();

        let resolution = match group.resolve(&types) {
            Ok(resolution) => resolution,
            Err(err) => {
                let mut diag = self.error_at(
                    ErrorKind::FunctionResolution(err.tier),
                    id,
                    err.to_string(),
                );
                for candidate in &err.candidates {
                    diag = diag.with_note(format!("candidate: {}{}", name, candidate));
                }
                if !group.doc().is_empty() {
                    diag = diag.with_help(format!("{}: {}", name, group.doc()));
                }
                self.diag(diag);
                return None;
            }
        };

        let function = resolution.function;
        let signature = &function.signature;
        let args: Vec<Operand> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| match signature.param(i) {
                Some((param, _)) => self.builder.convert(v, param),
                None => v,
            })
            .collect();

        match function.implementation {
            FunctionImpl::Native(func) => {
                Some(self.builder.call_native(name, func, &args, signature.ret))
            }
            FunctionImpl::Emitted(generate) => {
                let result = {
                    let mut emitter = FunctionEmitter::new(&mut self.builder, self.ctx.custom_data);
                    generate(&mut emitter, &args)
                };
                let checked = match result {
                    Some(op) if op.ty == signature.ret => Ok(op),
                    None if signature.ret == Ty::Void => Ok(self.builder.alloc(Ty::Void)),
                    Some(op) => Err(GenerationError::TypeMismatch {
                        name: name.to_string(),
                        signature: signature.clone(),
                        expected: signature.ret,
                        found: op.ty,
                    }),
                    None => Err(GenerationError::NoValue {
                        name: name.to_string(),
                        signature: signature.clone(),
                    }),
                };
                match checked {
                    Ok(op) => Some(op),
                    Err(err) => {
                        self.error(ErrorKind::FunctionGeneration, id, err.to_string());
                        None
                    }
                }
            }
        }
    }
}
