//! Declared handler parameters.
//!
//! A handler's formal parameters are declared when the [`Callable`] is built
//! and looked up here without invoking it. Lookup goes through the
//! [`Controllers`] registry for method references; anything that cannot be
//! resolved simply has no parameters.
//!
//! [`Callable`]: crate::Callable

use crate::handler::{Controllers, HandlerRef};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::sync::Arc;

/// Declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// A scalar such as `int`, `string`, `float` or `bool`.
    Builtin(&'static str),
    /// The server request.
    Request,
    /// A service resolved from the container by type.
    Service { id: TypeId, name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredParameter {
    pub name: String,
    pub ty: Option<ParamType>,
    pub optional: bool,
}

impl DeclaredParameter {
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            optional: false,
        }
    }

    pub fn builtin(name: impl Into<String>, ty: &'static str) -> Self {
        Self {
            ty: Some(ParamType::Builtin(ty)),
            ..Self::untyped(name)
        }
    }

    pub fn request(name: impl Into<String>) -> Self {
        Self {
            ty: Some(ParamType::Request),
            ..Self::untyped(name)
        }
    }

    pub fn service<T: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self {
            ty: Some(ParamType::Service {
                id: TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            }),
            ..Self::untyped(name)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn type_name(&self) -> Option<&'static str> {
        match self.ty.as_ref()? {
            ParamType::Builtin(name) => Some(*name),
            ParamType::Request => Some("request"),
            ParamType::Service { name, .. } => Some(*name),
        }
    }

    /// Untyped and named `request`, or typed as the request.
    pub fn wants_request(&self) -> bool {
        match &self.ty {
            None => self.name == "request",
            Some(ty) => *ty == ParamType::Request,
        }
    }
}

/// Lazily inspected parameters of one handler.
pub struct DeclaredParameters {
    handler: HandlerRef,
    controllers: Option<Arc<Controllers>>,
    parameters: OnceCell<Vec<DeclaredParameter>>,
}

impl DeclaredParameters {
    pub fn new(handler: HandlerRef, controllers: Option<Arc<Controllers>>) -> Self {
        Self {
            handler,
            controllers,
            parameters: OnceCell::new(),
        }
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// The declared parameters, computed on first access.
    pub fn parameters(&self) -> &[DeclaredParameter] {
        self.parameters.get_or_init(|| {
            self.handler
                .resolve(self.controllers.as_deref())
                .map(|callable| callable.parameters().to_vec())
                .unwrap_or_default()
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters().iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Callable, ControllerMethods, Target};

    fn controllers() -> Arc<Controllers> {
        let controllers = Controllers::new();
        controllers.register(
            "ProductsResource",
            ControllerMethods::new("ProductsResource")
                .method(
                    "edit",
                    Callable::from_fn(|_| Ok(().into()))
                        .param(DeclaredParameter::request("request"))
                        .param(DeclaredParameter::builtin("id", "int")),
                )
                .method(
                    "invoke",
                    Callable::from_fn(|_| Ok(().into())).param(DeclaredParameter::untyped("name")),
                ),
        );
        Arc::new(controllers)
    }

    #[test]
    fn test_closure_parameters() {
        let closure = Callable::from_fn(|_| Ok(().into()))
            .param(DeclaredParameter::untyped("request"))
            .param(DeclaredParameter::builtin("id", "int"));

        let declared = DeclaredParameters::new(closure.into(), None);
        assert_eq!(declared.names(), vec!["request", "id"]);
        assert!(declared.parameters()[0].wants_request());
        assert!(!declared.parameters()[1].wants_request());
    }

    fn names(handler: HandlerRef, registry: Option<&Arc<Controllers>>) -> Vec<String> {
        DeclaredParameters::new(handler, registry.cloned())
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_method_reference_shapes() {
        let registry = controllers();
        let edit = || HandlerRef::method("ProductsResource", "edit");

        assert_eq!(names(edit(), Some(&registry)), vec!["request", "id"]);

        let with_args = edit().with_arguments(crate::Arguments::new().with("id", 3));
        assert_eq!(names(with_args, Some(&registry)), vec!["request", "id"]);

        let string = HandlerRef::parse("ProductsResource::edit");
        assert_eq!(names(string, Some(&registry)), vec!["request", "id"]);

        let class = HandlerRef::parse("ProductsResource");
        assert_eq!(names(class, Some(&registry)), vec!["name"]);

        let instance = registry.get("ProductsResource").unwrap();
        let object = HandlerRef::Invokable(Target::Instance(instance));
        assert_eq!(names(object, None), vec!["name"]);
    }

    #[test]
    fn test_unresolvable_handlers_have_no_parameters() {
        let registry = controllers();

        assert!(names(HandlerRef::Empty, Some(&registry)).is_empty());
        assert!(names(HandlerRef::parse(""), Some(&registry)).is_empty());
        assert!(names(HandlerRef::parse("Missing::edit"), Some(&registry)).is_empty());
        assert!(names(HandlerRef::parse("ProductsResource::missing"), Some(&registry)).is_empty());
        assert!(names(HandlerRef::parse("ProductsResource::edit"), None).is_empty());
    }

    #[test]
    fn test_parameters_are_cached() {
        let handler = HandlerRef::method("ProductsResource", "edit");
        let declared = DeclaredParameters::new(handler, Some(controllers()));
        let first = declared.parameters().as_ptr();
        let second = declared.parameters().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_service_type_name() {
        struct Mailer;
        let param = DeclaredParameter::service::<Mailer>("mailer");
        assert!(param.type_name().unwrap().ends_with("Mailer"));
        assert!(!param.wants_request());
    }
}
