//! Expression resolution.
//!
//! Turns a parsed [`Expr`] into a [`ComputeNode`] tree: symbols become
//! references to existing variables, literals become typed constants,
//! arithmetic on two constants is folded, and every other operator or call
//! is bound to a concrete [`Operation`] by the matcher.

use super::{Operation, OperationMatcher, OperationWarning};
use crate::config::DatConfig;
use crate::error::{DatError, Result};
use crate::host::TypeRegistry;
use crate::parsing::Expr;
use crate::types::{ArithmeticOp, ConstantValue, TypeDescriptor};
use crate::variable::Variable;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read access to the named variables an expression may reference.
pub trait VariableLookup {
    fn get_variable(&self, name: &str) -> Option<Arc<Variable>>;
}

impl VariableLookup for BTreeMap<String, Arc<Variable>> {
    fn get_variable(&self, name: &str) -> Option<Arc<Variable>> {
        self.get(name).cloned()
    }
}

/// Resolved expression tree.
#[derive(Debug, Clone)]
pub enum ComputeNode {
    Constant {
        value: ConstantValue,
        ty: TypeDescriptor,
    },
    /// An existing variable, copied (not shared) when executed
    VariableRef {
        name: String,
        variable: Arc<Variable>,
    },
    Application {
        operation: Arc<Operation>,
        args: Vec<ComputeNode>,
    },
}

impl ComputeNode {
    pub fn result_type(&self) -> &TypeDescriptor {
        match self {
            ComputeNode::Constant { ty, .. } => ty,
            ComputeNode::VariableRef { variable, .. } => variable.ty(),
            ComputeNode::Application { operation, .. } => &operation.return_type,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ComputeNode::Constant { .. })
    }

    /// Number of operation applications in the tree.
    pub fn application_count(&self) -> usize {
        match self {
            ComputeNode::Application { args, .. } => {
                1 + args.iter().map(ComputeNode::application_count).sum::<usize>()
            }
            _ => 0,
        }
    }
}

pub struct Resolver<'a> {
    variables: &'a dyn VariableLookup,
    matcher: OperationMatcher<'a>,
    numeric_type: TypeDescriptor,
    string_type: TypeDescriptor,
    warnings: Vec<OperationWarning>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        variables: &'a dyn VariableLookup,
        matcher: OperationMatcher<'a>,
        registry: &dyn TypeRegistry,
        config: &DatConfig,
    ) -> Result<Self> {
        let basic = |name: &str| {
            registry
                .resolve_type(&config.packages.basic, name)
                .ok_or_else(|| DatError::UnknownType(format!("{}:{}", config.packages.basic, name)))
        };
        Ok(Self {
            variables,
            matcher,
            numeric_type: basic("Float")?,
            string_type: basic("String")?,
            warnings: Vec::new(),
        })
    }

    pub fn resolve(&mut self, expr: &Expr) -> Result<ComputeNode> {
        match expr {
            Expr::Symbol(name) => {
                let variable = self
                    .variables
                    .get_variable(name)
                    .ok_or_else(|| DatError::UnknownVariable(name.clone()))?;
                Ok(ComputeNode::VariableRef {
                    name: name.clone(),
                    variable,
                })
            }
            Expr::Number(value) => Ok(self.constant(value.clone())),
            Expr::Str(value) => Ok(self.constant(ConstantValue::String(value.clone()))),
            Expr::Op { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>>>()?;

                if let Some(folded) = self.fold(name, &args)? {
                    return Ok(folded);
                }

                let arg_types: Vec<TypeDescriptor> =
                    args.iter().map(|arg| arg.result_type().clone()).collect();
                let found = self.matcher.find_operation(name, &arg_types)?;
                self.warnings.extend(found.warning);
                Ok(ComputeNode::Application {
                    operation: found.operation,
                    args,
                })
            }
        }
    }

    pub fn warnings(&self) -> &[OperationWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<OperationWarning> {
        self.warnings
    }

    fn constant(&self, value: ConstantValue) -> ComputeNode {
        let ty = match value {
            ConstantValue::String(_) => self.string_type.clone(),
            _ => self.numeric_type.clone(),
        };
        ComputeNode::Constant { value, ty }
    }

    /// Evaluate `lhs op rhs` when both sides are constants the operator can
    /// combine.
    fn fold(&self, name: &str, args: &[ComputeNode]) -> Result<Option<ComputeNode>> {
        let Some(op) = ArithmeticOp::from_name(name) else {
            return Ok(None);
        };
        let [ComputeNode::Constant { value: lhs, .. }, ComputeNode::Constant { value: rhs, .. }] = args
        else {
            return Ok(None);
        };
        Ok(lhs.apply(op, rhs)?.map(|value| self.constant(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModuleRegistry;
    use crate::lattice::TypeLattice;
    use crate::operations::{OperationParameter, OperationRegistry, OperationSnapshot};
    use crate::parsing::parse_expression;
    use proptest::prelude::*;

    struct Fixture {
        config: DatConfig,
        registry: Arc<ModuleRegistry>,
        lattice: TypeLattice,
        operations: OperationSnapshot,
        variables: BTreeMap<String, Arc<Variable>>,
    }

    impl Fixture {
        fn new() -> Self {
            let config = DatConfig::default();
            let registry = Arc::new(ModuleRegistry::with_basic_package(&config));
            let lattice = TypeLattice::new(registry.clone());
            let mut operations = OperationRegistry::with_builtins(&config);
            let float = config.basic("Float");
            operations.register(
                Operation::with_callback(
                    "f",
                    vec![
                        OperationParameter::new("a", [float.clone()]),
                        OperationParameter::new("b", [float.clone()]),
                    ],
                    float.clone(),
                    |_, _| Ok(None),
                )
                .in_package("org.example"),
            );
            let mut variables = BTreeMap::new();
            variables.insert("a".to_string(), Arc::new(Variable::new(float)));
            Self {
                config,
                registry,
                lattice,
                operations: operations.snapshot(),
                variables,
            }
        }

        fn resolve(&self, text: &str) -> Result<(ComputeNode, Vec<OperationWarning>)> {
            let (_, expr) = parse_expression(text)?;
            let matcher = OperationMatcher::new(&self.operations, &self.lattice);
            let mut resolver = Resolver::new(&self.variables, matcher, &*self.registry, &self.config)?;
            let node = resolver.resolve(&expr)?;
            Ok((node, resolver.into_warnings()))
        }
    }

    fn folded(node: &ComputeNode) -> &ConstantValue {
        match node {
            ComputeNode::Constant { value, .. } => value,
            other => panic!("expected a constant, got {other:?}"),
        }
    }

    #[test]
    fn test_fold_integer_arithmetic() {
        let fixture = Fixture::new();
        let (node, _) = fixture.resolve("x = 2 + 3").unwrap();
        assert_eq!(folded(&node), &ConstantValue::Integer(5));
        assert_eq!(node.result_type(), &fixture.config.basic("Float"));
    }

    #[test]
    fn test_fold_nested_and_true_division() {
        let fixture = Fixture::new();
        let (node, _) = fixture.resolve("x = (1 + 2) * 4 / 8").unwrap();
        assert_eq!(folded(&node), &ConstantValue::Float(1.5));
    }

    #[test]
    fn test_fold_string_concatenation() {
        let fixture = Fixture::new();
        let (node, _) = fixture.resolve("x = 'ab' + \"cd\"").unwrap();
        assert_eq!(folded(&node), &ConstantValue::String("abcd".into()));
        assert_eq!(node.result_type(), &fixture.config.basic("String"));
    }

    #[test]
    fn test_division_by_zero() {
        let fixture = Fixture::new();
        assert!(matches!(fixture.resolve("x = 1 / 0"), Err(DatError::DivisionByZero)));
        assert!(matches!(fixture.resolve("x = 1.0 / 0.0"), Err(DatError::DivisionByZero)));
    }

    #[test]
    fn test_unfoldable_constants_go_to_matcher() {
        let fixture = Fixture::new();
        // String times number: no fold, and no built-in accepts it
        assert!(matches!(
            fixture.resolve("x = 'a' * 2"),
            Err(DatError::NoMatchingOperation { .. })
        ));
    }

    #[test]
    fn test_symbols_and_applications() {
        let fixture = Fixture::new();
        let (node, warnings) = fixture.resolve("b = f(a, 1)").unwrap();
        assert!(warnings.is_empty());
        match &node {
            ComputeNode::Application { operation, args } => {
                assert_eq!(operation.package, "org.example");
                assert!(matches!(&args[0], ComputeNode::VariableRef { name, .. } if name == "a"));
                assert!(args[1].is_constant());
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(node.application_count(), 1);
    }

    #[test]
    fn test_arithmetic_on_variable_uses_builtin() {
        let fixture = Fixture::new();
        let (node, _) = fixture.resolve("b = a * (2 + 3)").unwrap();
        match node {
            ComputeNode::Application { operation, args } => {
                assert_eq!(operation.name, "*");
                assert_eq!(folded(&args[1]), &ConstantValue::Integer(5));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_unknown_variable() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.resolve("b = a + missing"),
            Err(DatError::UnknownVariable(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_alias_resolves_to_reference() {
        let fixture = Fixture::new();
        let (node, _) = fixture.resolve("b = a").unwrap();
        assert!(matches!(node, ComputeNode::VariableRef { .. }));
    }

    proptest! {
        #[test]
        fn prop_folding_matches_integer_arithmetic(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let fixture = Fixture::new();
            let (node, _) = fixture.resolve(&format!("x = {} + {} * 2 - {}", a, b, a)).unwrap();
            prop_assert_eq!(folded(&node), &ConstantValue::Integer(a + b * 2 - a));
        }

        #[test]
        fn prop_folded_division_is_true_division(a in -1_000i64..1_000, b in 1i64..1_000) {
            let fixture = Fixture::new();
            let (node, _) = fixture.resolve(&format!("x = {} / {}", a, b)).unwrap();
            prop_assert_eq!(folded(&node), &ConstantValue::Float(a as f64 / b as f64));
        }
    }
}
