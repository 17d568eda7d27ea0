//! Test data builders for plot templates and operations

use super::test_type;
use dat_rs::config::DatConfig;
use dat_rs::host::{Connection, ConnectionId, GraphEdit, Module, ModuleId, Pipeline, PortRef};
use dat_rs::operations::OperationProvider;
use dat_rs::{Operation, OperationParameter, Plot, TypeDescriptor, Variable};
use std::collections::HashMap;

/// Builder for pipeline templates (plots and subworkflows).
///
/// Modules are referred to by labels; ids are assigned in insertion order.
pub struct TemplateBuilder {
    config: DatConfig,
    pipeline: Pipeline,
    labels: HashMap<String, ModuleId>,
    inputs: HashMap<String, ModuleId>,
    next_connection: u64,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            config: DatConfig::default(),
            pipeline: Pipeline::new(),
            labels: HashMap::new(),
            inputs: HashMap::new(),
            next_connection: 1,
        }
    }

    fn add(&mut self, descriptor: TypeDescriptor) -> ModuleId {
        let id = ModuleId(self.pipeline.modules.len() as u64 + 1);
        self.pipeline
            .apply(GraphEdit::AddModule(Module::new(id, descriptor)))
            .unwrap();
        id
    }

    fn id(&self, label: &str) -> ModuleId {
        *self
            .labels
            .get(label)
            .unwrap_or_else(|| panic!("no module labelled {:?}", label))
    }

    fn link(&mut self, source: PortRef, destination: PortRef) {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.pipeline
            .apply(GraphEdit::AddConnection(Connection {
                id,
                source,
                destination,
            }))
            .unwrap();
    }

    pub fn module(mut self, label: &str, descriptor: TypeDescriptor) -> Self {
        let id = self.add(descriptor);
        self.labels.insert(label.to_string(), id);
        self
    }

    pub fn function(mut self, label: &str, name: &str, value: &str) -> Self {
        let module = self.id(label);
        self.pipeline
            .apply(GraphEdit::SetFunction {
                module,
                name: name.to_string(),
                params: vec![value.to_string()],
            })
            .unwrap();
        self
    }

    pub fn connect(mut self, from: &str, out_port: &str, to: &str, in_port: &str) -> Self {
        let (from, to) = (self.id(from), self.id(to));
        self.link(PortRef::new(from, out_port), PortRef::new(to, in_port));
        self
    }

    /// Feed `to.in_port` from the InputPort named `parameter`, creating the
    /// InputPort on first use.
    pub fn input(mut self, parameter: &str, to: &str, in_port: &str) -> Self {
        let input = match self.inputs.get(parameter) {
            Some(id) => *id,
            None => {
                let id = self.add(self.config.basic("InputPort"));
                self.pipeline
                    .apply(GraphEdit::SetFunction {
                        module: id,
                        name: "name".to_string(),
                        params: vec![parameter.to_string()],
                    })
                    .unwrap();
                self.inputs.insert(parameter.to_string(), id);
                id
            }
        };
        let to = self.id(to);
        self.link(PortRef::new(input, "InternalPipe"), PortRef::new(to, in_port));
        self
    }

    /// Feed a new OutputPort from `from.out_port`.
    pub fn output(mut self, from: &str, out_port: &str) -> Self {
        let output = self.add(self.config.basic("OutputPort"));
        let from = self.id(from);
        self.link(PortRef::new(from, out_port), PortRef::new(output, "InternalPipe"));
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// `Plotter` fed by sockets `x` and `y`, with `x` also labelling the axis.
pub fn scatter_template() -> Pipeline {
    TemplateBuilder::new()
        .module("plotter", test_type("Plotter"))
        .module("label", test_type("Label"))
        .function("plotter", "title", "Scatter")
        .connect("label", "text", "plotter", "xlabel")
        .input("x", "plotter", "xs")
        .input("x", "label", "source")
        .input("y", "plotter", "ys")
        .build()
}

/// Provider handing out fixed lists of operations and plots.
pub struct TestProvider {
    pub package: String,
    pub operations: Vec<Operation>,
    pub plots: Vec<Plot>,
}

impl TestProvider {
    pub fn new(package: &str, operations: Vec<Operation>) -> Self {
        Self {
            package: package.to_string(),
            operations,
            plots: Vec::new(),
        }
    }

    pub fn with_plot(mut self, plot: Plot) -> Self {
        self.plots.push(plot);
        self
    }
}

impl OperationProvider for TestProvider {
    fn package(&self) -> &str {
        &self.package
    }

    fn operations(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    fn plots(&self) -> Vec<Plot> {
        self.plots.clone()
    }
}

/// `name(a: left, b: right) -> Float` building one `module` fed by both
/// arguments.
pub fn mix_operation(name: &str, left: TypeDescriptor, right: TypeDescriptor, module: TypeDescriptor) -> Operation {
    let float = DatConfig::default().basic("Float");
    Operation::with_callback(
        name,
        vec![
            OperationParameter::new("a", [left]),
            OperationParameter::new("b", [right]),
        ],
        float.clone(),
        move |controller, args| {
            let mut result = Variable::new(float.clone());
            let mut outputs = Vec::new();
            for arg in args {
                outputs.push(result.absorb(arg)?);
            }
            let mix = result.add_module(controller, &module);
            result.connect_output(controller, &outputs[0], mix, "a")?;
            result.connect_output(controller, &outputs[1], mix, "b")?;
            result.select_output_port(mix, "out")?;
            Ok(Some(result))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_builder() {
        let template = scatter_template();
        let config = DatConfig::default();

        assert_eq!(template.modules.len(), 4);
        assert_eq!(template.connections.len(), 4);
        let input_port = config.basic("InputPort");
        let inputs: Vec<_> = template.modules_of_type(&input_port).collect();
        assert_eq!(inputs.len(), 2);
    }
}
