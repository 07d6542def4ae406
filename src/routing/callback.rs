//! Callback targets and argument binding.
//!
//! # Responsibilities
//! - Represent what a route invokes: a handler function, a controller action,
//!   or a `"Controller@action"` target still to be resolved
//! - Declare the parameters a callable expects (`Signature`)
//! - Arrange captured/explicit params into the declared shape
//!
//! # Design Decisions
//! - Arrangement uses declared names, never runtime introspection
//! - `Signature::Raw` is the explicit opt-in for handlers that want every param
//! - Targets are parsed at registration; malformed ones fail at invocation

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::http::Exchange;
use crate::routing::error::DispatchError;
use crate::routing::params::Params;

/// Action used when a controller reference names no action.
pub const INVOKE: &str = "invoke";

/// Normalized result of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Content for the response body; goes through `present` listeners.
    Body(String),
    /// The response body is already populated; send it.
    Ready,
    /// The callback wrote and handled the response itself.
    Done,
    /// The callback failed; dispatch reports the route unavailable.
    Fail,
}

impl Outcome {
    pub fn body(content: impl Into<String>) -> Self {
        Outcome::Body(content.into())
    }
}

impl From<String> for Outcome {
    fn from(content: String) -> Self {
        Outcome::Body(content)
    }
}

impl From<&str> for Outcome {
    fn from(content: &str) -> Self {
        Outcome::Body(content.to_string())
    }
}

impl From<bool> for Outcome {
    fn from(ok: bool) -> Self {
        if ok {
            Outcome::Ready
        } else {
            Outcome::Fail
        }
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Done
    }
}

impl From<Option<String>> for Outcome {
    fn from(content: Option<String>) -> Self {
        content.map(Outcome::Body).unwrap_or(Outcome::Done)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

impl From<&str> for ParamSpec {
    fn from(name: &str) -> Self {
        ParamSpec::required(name)
    }
}

impl From<(&str, &str)> for ParamSpec {
    fn from((name, default): (&str, &str)) -> Self {
        ParamSpec::optional(name, default)
    }
}

/// The parameter shape a callable declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Params(Vec<ParamSpec>),
    /// Receives the merged params unarranged.
    Raw,
}

impl Signature {
    pub fn empty() -> Self {
        Signature::Params(Vec::new())
    }

    pub fn of<I, P>(params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamSpec>,
    {
        Signature::Params(params.into_iter().map(Into::into).collect())
    }

    /// Bind `params` to the declared parameters.
    ///
    /// Each parameter takes the value of the same name, else the next unnamed
    /// value, else its default. Unnamed values left over are an error.
    pub fn arrange(&self, params: &Params) -> Result<Arguments, DispatchError> {
        let specs = match self {
            Signature::Raw => return Ok(Arguments::raw(params.clone())),
            Signature::Params(specs) => specs,
        };

        let mut positional = params.positional();
        let mut values = Vec::with_capacity(specs.len());
        for param in specs {
            let value = if let Some(value) = params.get(&param.name) {
                value.to_string()
            } else if let Some(value) = positional.next() {
                value.to_string()
            } else if let Some(default) = &param.default {
                default.clone()
            } else {
                return Err(DispatchError::MissingArgument(param.name.clone()));
            };
            values.push((param.name.clone(), value));
        }

        let leftover = positional.count();
        if leftover > 0 {
            return Err(DispatchError::TooManyArguments {
                expected: specs.len(),
                given: specs.len() + leftover,
            });
        }

        Ok(Arguments {
            values,
            raw: params.clone(),
        })
    }
}

/// Arguments arranged for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: Vec<(String, String)>,
    raw: Params,
}

impl Arguments {
    fn raw(params: Params) -> Self {
        let values = params
            .named()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { values, raw: params }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a bound value, reporting an `InvalidArgument` on failure.
    pub fn parse<T>(&self, name: &str) -> Result<T, DispatchError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self
            .get(name)
            .ok_or_else(|| DispatchError::MissingArgument(name.to_string()))?;
        value.parse().map_err(|e: T::Err| DispatchError::InvalidArgument {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Every param offered to the callable, before arrangement.
    pub fn params(&self) -> &Params {
        &self.raw
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

type HandlerFn = dyn Fn(&mut Exchange, &Arguments) -> Result<Outcome, DispatchError> + Send + Sync;

/// A function callback with its declared signature.
#[derive(Clone)]
pub struct Handler {
    signature: Signature,
    func: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<I, P, F>(params: I, func: F) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamSpec>,
        F: Fn(&mut Exchange, &Arguments) -> Result<Outcome, DispatchError> + Send + Sync + 'static,
    {
        Self {
            signature: Signature::of(params),
            func: Arc::new(func),
        }
    }

    /// A handler that receives every param unarranged.
    pub fn raw<F>(func: F) -> Self
    where
        F: Fn(&mut Exchange, &Arguments) -> Result<Outcome, DispatchError> + Send + Sync + 'static,
    {
        Self {
            signature: Signature::Raw,
            func: Arc::new(func),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, exchange: &mut Exchange, args: &Arguments) -> Result<Outcome, DispatchError> {
        (self.func)(exchange, args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A group of named actions, instantiated lazily per invocation when
/// referenced by name.
pub trait Controller: Send + Sync {
    /// Declared parameters of `action`, `None` when there is no such action.
    fn signature(&self, action: &str) -> Option<Signature>;

    fn call(
        &self,
        action: &str,
        exchange: &mut Exchange,
        args: &Arguments,
    ) -> Result<Outcome, DispatchError>;
}

#[derive(Clone)]
pub enum ControllerRef {
    Instance(Arc<dyn Controller>),
    /// Resolved through the controller registry, namespace applied.
    Named(String),
}

impl fmt::Debug for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRef::Instance(_) => f.write_str("Instance(..)"),
            ControllerRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// What a route invokes.
#[derive(Debug, Clone)]
pub enum Callback {
    Handler(Handler),
    Action {
        controller: ControllerRef,
        action: String,
    },
    /// A target string that did not parse; fails when invoked.
    Target(String),
}

impl Callback {
    pub fn handler<I, P, F>(params: I, func: F) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamSpec>,
        F: Fn(&mut Exchange, &Arguments) -> Result<Outcome, DispatchError> + Send + Sync + 'static,
    {
        Callback::Handler(Handler::new(params, func))
    }

    pub fn action(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Callback::Action {
            controller: ControllerRef::Named(controller.into()),
            action: action.into(),
        }
    }

    pub fn instance(controller: Arc<dyn Controller>, action: Option<&str>) -> Self {
        Callback::Action {
            controller: ControllerRef::Instance(controller),
            action: action.unwrap_or(INVOKE).to_string(),
        }
    }

    /// Parse `"Controller@action"`; a bare `"Controller"` uses [`INVOKE`].
    pub fn parse(target: &str) -> Self {
        let target = target.trim();
        let mut parts = target.split('@');
        let controller = parts.next().unwrap_or_default();
        let action = parts.next();
        let valid = !controller.is_empty()
            && parts.next().is_none()
            && action.map_or(true, |a| !a.is_empty());
        if !valid {
            return Callback::Target(target.to_string());
        }
        Callback::action(controller, action.unwrap_or(INVOKE))
    }

    /// Short description for logs.
    pub fn label(&self) -> String {
        match self {
            Callback::Handler(_) => "<handler>".to_string(),
            Callback::Action {
                controller: ControllerRef::Named(name),
                action,
            } => format!("{name}@{action}"),
            Callback::Action {
                controller: ControllerRef::Instance(_),
                action,
            } => format!("<controller>@{action}"),
            Callback::Target(raw) => raw.clone(),
        }
    }
}

impl From<Handler> for Callback {
    fn from(handler: Handler) -> Self {
        Callback::Handler(handler)
    }
}

impl From<&str> for Callback {
    fn from(target: &str) -> Self {
        Callback::parse(target)
    }
}

impl From<String> for Callback {
    fn from(target: String) -> Self {
        Callback::parse(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrange_by_name_then_position_then_default() {
        let sig = Signature::of([
            ParamSpec::required("id"),
            ParamSpec::required("slug"),
            ParamSpec::optional("page", "1"),
        ]);
        let mut params = Params::from([("id", "42")]);
        params.push("hello");
        let args = sig.arrange(&params).unwrap();
        assert_eq!(args.get("id"), Some("42"));
        assert_eq!(args.get("slug"), Some("hello"));
        assert_eq!(args.get("page"), Some("1"));
        assert_eq!(args.at(2), Some("1"));
    }

    #[test]
    fn test_missing_argument_names_parameter() {
        let sig = Signature::of(["id"]);
        let err = sig.arrange(&Params::new()).unwrap_err();
        assert!(matches!(err, DispatchError::MissingArgument(name) if name == "id"));
    }

    #[test]
    fn test_too_many_positional() {
        let sig = Signature::of(["a"]);
        let mut params = Params::new();
        params.push("1");
        params.push("2");
        assert!(matches!(
            sig.arrange(&params),
            Err(DispatchError::TooManyArguments { expected: 1, given: 2 })
        ));
    }

    #[test]
    fn test_extra_named_values_are_ignored() {
        let sig = Signature::of(["a"]);
        let params = Params::from([("a", "1"), ("b", "2")]);
        let args = sig.arrange(&params).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.params().get("b"), Some("2"));
    }

    #[test]
    fn test_raw_signature_passes_everything() {
        let params = Params::from([("a", "1"), ("b", "2")]);
        let args = Signature::Raw.arrange(&params).unwrap();
        assert_eq!(args.get("b"), Some("2"));
        assert_eq!(args.params(), &params);
    }

    #[test]
    fn test_parse_argument() {
        let args = Signature::of(["n"]).arrange(&Params::from([("n", "12")])).unwrap();
        assert_eq!(args.parse::<u32>("n").unwrap(), 12);

        let args = Signature::of(["n"]).arrange(&Params::from([("n", "x")])).unwrap();
        assert!(matches!(
            args.parse::<u32>("n"),
            Err(DispatchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!(Callback::parse("Users@show").label(), "Users@show");
        assert_eq!(Callback::parse("Users").label(), "Users@invoke");
        assert!(matches!(Callback::parse("Users@"), Callback::Target(_)));
        assert!(matches!(Callback::parse("@show"), Callback::Target(_)));
        assert!(matches!(Callback::parse("a@b@c"), Callback::Target(_)));
    }

    #[test]
    fn test_outcome_conversions() {
        assert_eq!(Outcome::from(true), Outcome::Ready);
        assert_eq!(Outcome::from(false), Outcome::Fail);
        assert_eq!(Outcome::from(()), Outcome::Done);
        assert_eq!(Outcome::from(None::<String>), Outcome::Done);
        assert_eq!(Outcome::from("hi"), Outcome::Body("hi".into()));
    }
}
