//! # Bind-Time Shape Validation
//!
//! Typed function handlers always bind. Hand-written handlers describing
//! any other shape are rejected before anything touches the bus, in every
//! endpoint configuration.

#[cfg(test)]
mod tests {
    use crate::harness::Harness;
    use async_trait::async_trait;
    use bus_rpc::{
        by_pointer, by_value, Argument, Convention, EndpointError, Endpoints, Handler,
        HandlerError, ParamKind, ReturnKind, Shape, SignatureError,
    };

    /// A handler that reports an arbitrary shape.
    struct Declared(Shape);

    #[async_trait]
    impl Handler<String> for Declared {
        fn shape(&self) -> Shape {
            self.0.clone()
        }

        async fn invoke(&self, _: Argument<String>) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn function(params: Vec<ParamKind>, returns: Vec<ReturnKind>) -> Shape {
        Shape::Function { params, returns }
    }

    fn invalid_shapes() -> Vec<(Shape, SignatureError)> {
        let text = || ParamKind::value::<String>();
        vec![
            (
                Shape::NotAFunction {
                    type_name: "u32".to_string(),
                },
                SignatureError::NotAFunction {
                    type_name: "u32".to_string(),
                },
            ),
            (
                function(vec![], vec![ReturnKind::Error]),
                SignatureError::WrongArity { found: 0 },
            ),
            (
                function(vec![text(), text()], vec![ReturnKind::Error]),
                SignatureError::WrongArity { found: 2 },
            ),
            (
                function(vec![text()], vec![]),
                SignatureError::WrongReturnArity { found: 0 },
            ),
            (
                function(vec![text()], vec![ReturnKind::Error, ReturnKind::Error]),
                SignatureError::WrongReturnArity { found: 2 },
            ),
            (
                function(
                    vec![text()],
                    vec![ReturnKind::Other {
                        type_name: "String".to_string(),
                    }],
                ),
                SignatureError::ReturnNotError {
                    type_name: "String".to_string(),
                },
            ),
            (
                function(
                    vec![ParamKind::Function {
                        type_name: "fn(String)".to_string(),
                    }],
                    vec![ReturnKind::Error],
                ),
                SignatureError::FunctionParameter {
                    type_name: "fn(String)".to_string(),
                },
            ),
        ]
    }

    async fn assert_all_rejected(endpoints: &Endpoints) {
        for (shape, expected) in invalid_shapes() {
            match endpoints.function("shaped", Declared(shape)).await {
                Err(EndpointError::Signature(actual)) => assert_eq!(actual, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_shapes_rejected_direct() {
        let harness = Harness::new();
        assert_all_rejected(&harness.direct()).await;
    }

    #[tokio::test]
    async fn test_invalid_shapes_rejected_before_bus() {
        let harness = Harness::new();
        assert_all_rejected(&harness.server("workers")).await;
        assert_all_rejected(&harness.client()).await;

        assert!(!harness.bus.topic_exists("shaped"));
    }

    #[tokio::test]
    async fn test_unique_rejects_invalid_shape() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");

        let err = endpoints
            .unique("result", Declared(function(vec![], vec![])))
            .await
            .unwrap_err();
        assert!(matches!(err, EndpointError::Signature(_)));
        assert_eq!(endpoints.registration_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_and_declared_valid_shapes_bind() {
        let harness = Harness::new();
        let endpoints = harness.server("workers");

        endpoints
            .function("by-value", by_value(|_: String| async { Ok(()) }))
            .await
            .unwrap();
        endpoints
            .function("by-pointer", by_pointer(|_: Box<String>| async { Ok(()) }))
            .await
            .unwrap();
        endpoints
            .function(
                "declared",
                Declared(Shape::unary(ParamKind::pointer::<String>())),
            )
            .await
            .unwrap();

        assert_eq!(endpoints.registration_count(), 3);
        assert_eq!(
            Shape::unary(ParamKind::value::<String>()).validate(),
            Ok(Convention::ByValue)
        );
    }
}
