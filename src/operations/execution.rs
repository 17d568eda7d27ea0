//! Execution of resolved expression trees.
//!
//! [`execute`] walks a [`ComputeNode`] bottom-up and builds one unmaterialized
//! [`Variable`]. Every buffered edit stays in that variable until the caller
//! materializes it, so a failure anywhere leaves the store untouched.

use super::{ComputeNode, Operation, OperationImpl};
use crate::error::{DatError, Result};
use crate::host::{Controller, ModuleId, Pipeline, PortRef};
use crate::provenance::Provenance;
use crate::types::TypeDescriptor;
use crate::variable::Variable;
use std::collections::HashMap;
use std::sync::Arc;

pub fn execute(node: &ComputeNode, controller: &mut Controller<'_>) -> Result<Variable> {
    match node {
        ComputeNode::Constant { value, ty } => Variable::constant(controller, value, ty),
        // A fresh copy; the referenced variable stays untouched
        ComputeNode::VariableRef { variable, .. } => Variable::from_workflow(controller, variable),
        ComputeNode::Application { operation, args } => {
            let args = args
                .iter()
                .map(|arg| execute(arg, controller))
                .collect::<Result<Vec<_>>>()?;
            apply_operation(controller, operation, args)
        }
    }
}

/// Run an operation on already-built argument variables.
///
/// The result is stamped with `Operation` provenance unless the
/// implementation recorded its own.
pub fn apply_operation(
    controller: &mut Controller<'_>,
    operation: &Arc<Operation>,
    args: Vec<Variable>,
) -> Result<Variable> {
    let arguments: Vec<Option<Provenance>> = args.iter().map(|arg| arg.provenance().cloned()).collect();
    tracing::debug!("Applying {} to {} arguments", operation, args.len());

    let mut result = match &operation.implementation {
        OperationImpl::Callback(callback) => callback(controller, args)?.ok_or_else(|| {
            DatError::implementation(&operation.name, "operation callback returned no variable")
        })?,
        OperationImpl::Subworkflow(template) => apply_subworkflow(controller, operation, template, args)?,
    };

    if result.provenance().is_none() {
        result.set_provenance(Provenance::Operation {
            operation: operation.reference(),
            arguments,
        });
    }
    Ok(result)
}

/// Splice a subworkflow template between the argument subgraphs and a new
/// output.
///
/// InputPort modules are matched to parameters by their `name` function;
/// the template's single OutputPort feed becomes the result's output.
fn apply_subworkflow(
    controller: &mut Controller<'_>,
    operation: &Operation,
    template: &Pipeline,
    args: Vec<Variable>,
) -> Result<Variable> {
    let input_type = controller.basic_type("InputPort")?;
    let output_type = controller.basic_type("OutputPort")?;
    let fail = |message: String| DatError::implementation(&operation.name, message);

    let mut result = Variable::new(operation.return_type.clone());
    let mut inputs: HashMap<&str, PortRef> = HashMap::new();
    for (parameter, arg) in operation.parameters.iter().zip(args) {
        inputs.insert(parameter.name.as_str(), result.absorb(arg)?);
    }

    let is_placeholder =
        |descriptor: &TypeDescriptor| descriptor == &input_type || descriptor == &output_type;
    let mapping = result
        .generator_mut()
        .copy_modules(controller, template, |m| !is_placeholder(&m.descriptor));
    let copied = |id: ModuleId| {
        mapping
            .get(&id)
            .copied()
            .ok_or_else(|| fail(format!("template module {} was not copied", id)))
    };

    let mut output = None;
    for connection in template.connections.values() {
        let module = |id: ModuleId| {
            template
                .module(id)
                .ok_or_else(|| fail(format!("template references missing module {}", id)))
        };
        let source = module(connection.source.module)?;
        let destination = module(connection.destination.module)?;

        let feed = if source.descriptor == input_type {
            let name = source
                .function("name")
                .ok_or_else(|| fail("template InputPort has no name".into()))?;
            inputs
                .get(name)
                .cloned()
                .ok_or_else(|| fail(format!("template input {:?} is not a parameter", name)))?
        } else {
            PortRef::new(copied(source.id)?, connection.source.port.clone())
        };

        if destination.descriptor == output_type {
            if output.replace(feed).is_some() {
                return Err(fail("template has more than one OutputPort connection".into()));
            }
        } else {
            let target = PortRef::new(copied(destination.id)?, connection.destination.port.clone());
            result.generator_mut().connect(controller, feed, target)?;
        }
    }

    let output = output.ok_or_else(|| fail("template has no connected OutputPort".into()))?;
    result.set_output(output);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatConfig;
    use crate::host::{Connection, ConnectionId, GraphEdit, MemoryVistrail, Module, ModuleRegistry};
    use crate::operations::OperationParameter;
    use crate::types::ConstantValue;

    struct Fixture {
        config: DatConfig,
        registry: ModuleRegistry,
        store: MemoryVistrail,
    }

    impl Fixture {
        fn new() -> Self {
            let config = DatConfig::default();
            let registry = ModuleRegistry::with_basic_package(&config);
            Self {
                config,
                registry,
                store: MemoryVistrail::new(),
            }
        }

        fn controller(&mut self) -> Controller<'_> {
            Controller::new(&mut self.store, &self.registry, &self.config)
        }
    }

    fn float_op(callback: impl Fn(&mut Controller<'_>, Vec<Variable>) -> Result<Option<Variable>> + Send + Sync + 'static) -> Arc<Operation> {
        let float = DatConfig::default().basic("Float");
        Arc::new(
            Operation::with_callback("f", vec![OperationParameter::new("x", [float.clone()])], float, callback)
                .in_package("org.example"),
        )
    }

    /// InputPort(x) ─► Float ─► OutputPort
    fn identity_template(config: &DatConfig) -> Pipeline {
        let mut pipeline = Pipeline::new();
        let mut input = Module::new(ModuleId(1), config.basic("InputPort"));
        input.set_function("name", vec!["x".into()]);
        let mut output = Module::new(ModuleId(3), config.basic("OutputPort"));
        output.set_function("name", vec!["value".into()]);
        for module in [input, Module::new(ModuleId(2), config.basic("Float")), output] {
            pipeline.apply(GraphEdit::AddModule(module)).unwrap();
        }
        let link = |id, from, to| Connection {
            id: ConnectionId(id),
            source: PortRef::new(ModuleId(from), "value"),
            destination: PortRef::new(ModuleId(to), "value"),
        };
        pipeline.apply(GraphEdit::AddConnection(link(1, 1, 2))).unwrap();
        pipeline.apply(GraphEdit::AddConnection(link(2, 2, 3))).unwrap();
        pipeline
    }

    #[test]
    fn test_callback_returning_nothing_is_an_error() {
        let mut fixture = Fixture::new();
        let float = fixture.config.basic("Float");
        let mut controller = fixture.controller();
        let arg = Variable::constant(&mut controller, &ConstantValue::Integer(1), &float).unwrap();

        let err = apply_operation(&mut controller, &float_op(|_, _| Ok(None)), vec![arg]).unwrap_err();
        assert!(matches!(err, DatError::OperationImplementation { operation, .. } if operation == "f"));
    }

    #[test]
    fn test_provenance_is_stamped() {
        let mut fixture = Fixture::new();
        let float = fixture.config.basic("Float");
        let mut controller = fixture.controller();
        let arg = Variable::constant(&mut controller, &ConstantValue::Integer(7), &float).unwrap();

        let op = float_op(|controller, mut args| {
            let mut result = Variable::new(controller.basic_type("Float")?);
            let output = result.absorb(args.remove(0))?;
            result.set_output(output);
            Ok(Some(result))
        });
        let result = apply_operation(&mut controller, &op, vec![arg]).unwrap();

        match result.provenance().unwrap() {
            Provenance::Operation { operation, arguments } => {
                assert_eq!(operation.name, "f");
                assert_eq!(
                    arguments,
                    &vec![Some(Provenance::Constant {
                        value: ConstantValue::Integer(7)
                    })]
                );
            }
            other => panic!("unexpected provenance {other:?}"),
        }
    }

    #[test]
    fn test_callback_provenance_is_kept() {
        let mut fixture = Fixture::new();
        let float = fixture.config.basic("Float");
        let mut controller = fixture.controller();
        let arg = Variable::constant(&mut controller, &ConstantValue::Integer(7), &float).unwrap();

        let op = float_op(|_, mut args| {
            let arg = args.remove(0);
            Ok(Some(arg.with_provenance(Provenance::loader("custom"))))
        });
        let result = apply_operation(&mut controller, &op, vec![arg]).unwrap();
        assert_eq!(result.provenance(), Some(&Provenance::loader("custom")));
    }

    #[test]
    fn test_subworkflow_splices_template() {
        let mut fixture = Fixture::new();
        let config = fixture.config.clone();
        let float = config.basic("Float");
        let op = Arc::new(Operation::with_subworkflow(
            "identity",
            vec![OperationParameter::new("x", [float.clone()])],
            float.clone(),
            identity_template(&config),
        ));

        let mut controller = fixture.controller();
        let arg = Variable::constant(&mut controller, &ConstantValue::Integer(4), &float).unwrap();
        let arg_output = arg.output().cloned().unwrap();
        let mut result = apply_operation(&mut controller, &op, vec![arg]).unwrap();

        // constant + the template's Float; placeholders are not copied
        assert_eq!(result.generator().module_count(), 2);
        let version = result.materialize(&mut controller, "same").unwrap();
        let pipeline = controller.store().pipeline(version).unwrap();
        assert!(pipeline.modules_of_type(&config.basic("InputPort")).next().is_none());

        let inner = pipeline
            .connections
            .values()
            .find(|c| c.source == arg_output)
            .unwrap();
        assert_eq!(pipeline.module(inner.destination.module).unwrap().descriptor, float);
        assert_eq!(result.output().unwrap().module, inner.destination.module);
    }

    #[test]
    fn test_subworkflow_without_output_fails() {
        let mut fixture = Fixture::new();
        let config = fixture.config.clone();
        let float = config.basic("Float");
        let mut template = identity_template(&config);
        template.connections.remove(&ConnectionId(2));
        let op = Arc::new(Operation::with_subworkflow(
            "broken",
            vec![OperationParameter::new("x", [float.clone()])],
            float.clone(),
            template,
        ));

        let mut controller = fixture.controller();
        let arg = Variable::constant(&mut controller, &ConstantValue::Integer(4), &float).unwrap();
        assert!(matches!(
            apply_operation(&mut controller, &op, vec![arg]),
            Err(DatError::OperationImplementation { .. })
        ));
    }

    #[test]
    fn test_execute_copies_referenced_variables() {
        let mut fixture = Fixture::new();
        let float = fixture.config.basic("Float");
        let mut controller = fixture.controller();

        let mut original = Variable::constant(&mut controller, &ConstantValue::Integer(3), &float).unwrap();
        original.materialize(&mut controller, "a").unwrap();
        let original = Arc::new(original);

        let node = ComputeNode::VariableRef {
            name: "a".into(),
            variable: original.clone(),
        };
        let copy = execute(&node, &mut controller).unwrap();
        assert!(!copy.is_materialized());
        assert_eq!(copy.generator().module_count(), 1);
        assert!(original.is_materialized());

        let constant = ComputeNode::Constant {
            value: ConstantValue::String("hi".into()),
            ty: TypeDescriptor::new("org.vistrails.vistrails.basic", "String"),
        };
        assert_eq!(execute(&constant, &mut controller).unwrap().generator().module_count(), 1);
    }
}
