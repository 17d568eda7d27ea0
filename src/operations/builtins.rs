//! Built-in operations
//!
//! - `+ - * /` on two Floats, through a PythonCalc module
//! - `+` on two Strings, through a ConcatenateString module
//!
//! Integer arguments match the Float parameters through inheritance.

use super::{Operation, OperationParameter};
use crate::config::DatConfig;
use crate::error::{DatError, Result};
use crate::host::Controller;
use crate::types::ArithmeticOp;
use crate::variable::Variable;

/// Package name stamped on built-in operations.
pub const BUILTIN_PACKAGE: &str = "dat.builtins";

pub fn builtin_operations(config: &DatConfig) -> Vec<Operation> {
    let float = config.basic("Float");
    let string = config.basic("String");

    let mut operations: Vec<Operation> = [ArithmeticOp::Add, ArithmeticOp::Sub, ArithmeticOp::Mul, ArithmeticOp::Div]
        .into_iter()
        .map(|op| {
            Operation::with_callback(
                op.symbol(),
                vec![
                    OperationParameter::new("value1", [float.clone()]),
                    OperationParameter::new("value2", [float.clone()]),
                ],
                float.clone(),
                move |controller, args| python_calc(controller, op, args),
            )
            .in_package(BUILTIN_PACKAGE)
        })
        .collect();

    operations.push(
        Operation::with_callback(
            "+",
            vec![
                OperationParameter::new("str1", [string.clone()]),
                OperationParameter::new("str2", [string.clone()]),
            ],
            string,
            concatenate,
        )
        .in_package(BUILTIN_PACKAGE),
    );

    operations
}

fn two_args(operation: &str, args: Vec<Variable>) -> Result<[Variable; 2]> {
    args.try_into()
        .map_err(|args: Vec<Variable>| DatError::implementation(operation, format!("expected 2 arguments, got {}", args.len())))
}

fn python_calc(controller: &mut Controller<'_>, op: ArithmeticOp, args: Vec<Variable>) -> Result<Option<Variable>> {
    let [left, right] = two_args(op.symbol(), args)?;
    let float = controller.basic_type("Float")?;
    let calc = controller.resolve_type(&controller.config().packages.pythoncalc, "PythonCalc")?;

    let mut result = Variable::new(float);
    let left = result.absorb(left)?;
    let right = result.absorb(right)?;
    let module = result.add_module(controller, &calc);
    result.add_function(module, "op", vec![op.symbol().to_string()])?;
    result.connect_output(controller, &left, module, "value1")?;
    result.connect_output(controller, &right, module, "value2")?;
    result.select_output_port(module, "value")?;
    Ok(Some(result))
}

fn concatenate(controller: &mut Controller<'_>, args: Vec<Variable>) -> Result<Option<Variable>> {
    let [left, right] = two_args("+", args)?;
    let string = controller.basic_type("String")?;
    let concat = controller.basic_type("ConcatenateString")?;

    let mut result = Variable::new(string);
    let left = result.absorb(left)?;
    let right = result.absorb(right)?;
    let module = result.add_module(controller, &concat);
    result.connect_output(controller, &left, module, "str1")?;
    result.connect_output(controller, &right, module, "str2")?;
    result.select_output_port(module, "value")?;
    Ok(Some(result))
}
