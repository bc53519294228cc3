use bson::Bson;

/// Leaf comparison/operator applied to the value found at a field's path.
///
/// Mirrors the fixed operator set named in the specification:
/// `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex $size $all $elemMatch
/// $type $not $mod`.
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
    /// Pre-compiled so the same selector can be evaluated many times without
    /// recompiling the pattern per document.
    Regex(regex::Regex),
    Size(i64),
    All(Vec<Bson>),
    ElemMatch(Box<crate::selector::Selector>),
    Type(BsonTypeName),
    Not(Box<Condition>),
    Mod(i64, i64),
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        use Condition::*;
        match (self, other) {
            (Eq(a), Eq(b)) | (Ne(a), Ne(b)) => a == b,
            (Gt(a), Gt(b)) | (Gte(a), Gte(b)) | (Lt(a), Lt(b)) | (Lte(a), Lte(b)) => a == b,
            (In(a), In(b)) | (Nin(a), Nin(b)) | (All(a), All(b)) => a == b,
            (Exists(a), Exists(b)) => a == b,
            (Regex(a), Regex(b)) => a.as_str() == b.as_str(),
            (Size(a), Size(b)) => a == b,
            (ElemMatch(a), ElemMatch(b)) => a == b,
            (Type(a), Type(b)) => a == b,
            (Not(a), Not(b)) => a == b,
            (Mod(a, b), Mod(c, d)) => a == c && b == d,
            _ => false,
        }
    }
}

/// BSON type names accepted by `$type`, matching MongoDB's alias set that
/// applies to the subset of types this engine's `Value` model carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsonTypeName {
    Double,
    String,
    Object,
    Array,
    Boolean,
    Date,
    Null,
    Int,
    Long,
}

impl BsonTypeName {
    pub fn matches(self, value: &Bson) -> bool {
        matches!(
            (self, value),
            (BsonTypeName::Double, Bson::Double(_))
                | (BsonTypeName::String, Bson::String(_))
                | (BsonTypeName::Object, Bson::Document(_))
                | (BsonTypeName::Array, Bson::Array(_))
                | (BsonTypeName::Boolean, Bson::Boolean(_))
                | (BsonTypeName::Date, Bson::DateTime(_))
                | (BsonTypeName::Null, Bson::Null)
                | (BsonTypeName::Int, Bson::Int32(_))
                | (BsonTypeName::Long, Bson::Int64(_))
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "double" => BsonTypeName::Double,
            "string" => BsonTypeName::String,
            "object" => BsonTypeName::Object,
            "array" => BsonTypeName::Array,
            "bool" | "boolean" => BsonTypeName::Boolean,
            "date" => BsonTypeName::Date,
            "null" => BsonTypeName::Null,
            "int" => BsonTypeName::Int,
            "long" => BsonTypeName::Long,
            _ => return None,
        })
    }
}
