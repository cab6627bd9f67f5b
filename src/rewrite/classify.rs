use crate::jvm::{
    BaseType, BinaryName, FieldType, Name, RefType, RenderDescriptor, VerificationType,
};

/// Verification type of a value of the given type, as seen by the verifier when it sits in a
/// local variable
///
/// Sub-word integral types all verify as `int`. Arrays are identified by their descriptor and
/// other objects by their internal name, matching what a `CONSTANT_Class` would contain.
pub fn verification_type<U>(field_type: &FieldType<BinaryName>) -> VerificationType<String, U> {
    match field_type {
        FieldType::Base(BaseType::Boolean)
        | FieldType::Base(BaseType::Byte)
        | FieldType::Base(BaseType::Char)
        | FieldType::Base(BaseType::Short)
        | FieldType::Base(BaseType::Int) => VerificationType::Integer,
        FieldType::Base(BaseType::Float) => VerificationType::Float,
        FieldType::Base(BaseType::Long) => VerificationType::Long,
        FieldType::Base(BaseType::Double) => VerificationType::Double,
        FieldType::Ref(RefType::Object(class)) => {
            VerificationType::Object(class.as_str().to_owned())
        }
        FieldType::Ref(array_type) => VerificationType::Object(array_type.render()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Label;
    use crate::jvm::{ArrayType, ParseDescriptor};
    use crate::util::Width;

    fn classify(descriptor: &str) -> VerificationType<String, Label> {
        verification_type(&FieldType::parse(descriptor).unwrap())
    }

    #[test]
    fn primitives() {
        for descriptor in ["Z", "B", "C", "S", "I"] {
            assert_eq!(classify(descriptor), VerificationType::Integer);
        }
        assert_eq!(classify("F"), VerificationType::Float);
        assert_eq!(classify("J"), VerificationType::Long);
        assert_eq!(classify("D"), VerificationType::Double);
        assert_eq!(classify("J").width(), 2);
        assert_eq!(classify("D").width(), 2);
        assert_eq!(classify("F").width(), 1);
    }

    #[test]
    fn references() {
        assert_eq!(
            classify("Ljava/lang/String;"),
            VerificationType::Object(String::from("java/lang/String"))
        );
        assert_eq!(classify("[I"), VerificationType::Object(String::from("[I")));
        assert_eq!(
            classify("[[Ljava/lang/Object;"),
            VerificationType::Object(String::from("[[Ljava/lang/Object;"))
        );

        let array: FieldType<BinaryName> = FieldType::Ref(RefType::PrimitiveArray(ArrayType {
            additional_dimensions: 0,
            element_type: BaseType::Long,
        }));
        assert_eq!(
            verification_type::<Label>(&array),
            VerificationType::Object(String::from("[J"))
        );
    }
}
