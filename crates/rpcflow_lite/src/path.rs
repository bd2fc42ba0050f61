use std::fmt;

use crate::error::MethodPathError;

/// A parsed method path: `{package}.{service}/{method}`
///
/// Example: `calculator.CalculatorService/Sum`
/// - `package`: `calculator`
/// - `service`: `CalculatorService`
/// - `method`: `Sum`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPath {
    pub package: String,
    pub service: String,
    pub method: String,
}

impl MethodPath {
    /// Parse a method path string.
    ///
    /// Expected format: `{package}.{service}/{method}`
    pub fn parse(path: &str) -> Result<Self, MethodPathError> {
        let path = path.strip_prefix('/').unwrap_or(path);

        let (service_path, method) = path.rsplit_once('/').ok_or_else(|| {
            MethodPathError::Invalid(format!("method path must contain '/': '{path}'"))
        })?;

        let (package, service) = service_path.rsplit_once('.').ok_or_else(|| {
            MethodPathError::Invalid(format!(
                "service path must contain package.service: '{service_path}'"
            ))
        })?;

        if package.is_empty() || service.is_empty() || method.is_empty() {
            return Err(MethodPathError::Invalid(format!(
                "package, service, and method must all be non-empty: '{path}'"
            )));
        }

        Ok(MethodPath {
            package: package.to_owned(),
            service: service.to_owned(),
            method: method.to_owned(),
        })
    }

    /// Returns the full service name: `{package}.{service}`
    pub fn full_service(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }

    /// Returns the full method path: `{package}.{service}/{method}`
    pub fn full_path(&self) -> String {
        format!("{}.{}/{}", self.package, self.service, self.method)
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.package, self.service, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_path_parse() {
        let path = MethodPath::parse("calculator.CalculatorService/Sum").unwrap();
        assert_eq!(path.package, "calculator");
        assert_eq!(path.service, "CalculatorService");
        assert_eq!(path.method, "Sum");
        assert_eq!(path.full_service(), "calculator.CalculatorService");
        assert_eq!(path.full_path(), "calculator.CalculatorService/Sum");
    }

    #[test]
    fn test_method_path_with_leading_slash() {
        let path = MethodPath::parse("/greet.GreetService/Greet").unwrap();
        assert_eq!(path.package, "greet");
        assert_eq!(path.service, "GreetService");
        assert_eq!(path.method, "Greet");
    }

    #[test]
    fn test_method_path_nested_package() {
        let path = MethodPath::parse("com.example.greet.GreetService/Greet").unwrap();
        assert_eq!(path.package, "com.example.greet");
        assert_eq!(path.service, "GreetService");
        assert_eq!(path.method, "Greet");
    }

    #[test]
    fn test_method_path_missing_method() {
        assert!(MethodPath::parse("calculator.CalculatorService").is_err());
    }

    #[test]
    fn test_method_path_missing_package() {
        assert!(MethodPath::parse("CalculatorService/Sum").is_err());
    }

    #[test]
    fn test_method_path_empty_parts() {
        assert!(MethodPath::parse("calculator.CalculatorService/").is_err());
        assert!(MethodPath::parse(".Service/Method").is_err());
    }
}
