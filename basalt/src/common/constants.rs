// doc constants
pub const DOC_ID: &str = "_id";
pub const FIELD_SEPARATOR: &str = ".";

// reference constants
pub const REF_NAMESPACE: &str = "$ref";
pub const REF_ID: &str = "$id";
pub const REF_DATABASE: &str = "$db";

// index constants
pub const ID_INDEX_NAME: &str = "_id_";
pub const ALL_INDEXES: &str = "*";
pub const INDEX_VERSION: i32 = 2;
pub const INDEX_KIND_2D: &str = "2d";
pub const INDEX_KIND_2DSPHERE: &str = "2dsphere";
pub const INDEX_KIND_TEXT: &str = "text";
pub const INDEX_KIND_HASHED: &str = "hashed";

// reply fields
pub const REPLY_OK: &str = "ok";
pub const REPLY_ERRMSG: &str = "errmsg";
pub const REPLY_CODE: &str = "code";
pub const REPLY_CURSOR: &str = "cursor";
pub const REPLY_FIRST_BATCH: &str = "firstBatch";

// store error codes
pub const CODE_BAD_VALUE: i32 = 2;
pub const CODE_FAILED_TO_PARSE: i32 = 9;
pub const CODE_TYPE_MISMATCH: i32 = 14;
pub const CODE_ILLEGAL_OPERATION: i32 = 20;
pub const CODE_NAMESPACE_NOT_FOUND: i32 = 26;
pub const CODE_INDEX_NOT_FOUND: i32 = 27;
pub const CODE_NAMESPACE_EXISTS: i32 = 48;
pub const CODE_COMMAND_NOT_FOUND: i32 = 59;
pub const CODE_IMMUTABLE_FIELD: i32 = 66;
pub const CODE_CANNOT_CREATE_INDEX: i32 = 67;
pub const CODE_INVALID_OPTIONS: i32 = 72;
pub const CODE_INVALID_NAMESPACE: i32 = 73;
pub const CODE_INDEX_OPTIONS_CONFLICT: i32 = 85;
pub const CODE_DUPLICATE_KEY: i32 = 11000;

// characters a database name may not contain
pub const INVALID_DATABASE_CHARS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];
