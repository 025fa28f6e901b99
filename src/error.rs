use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError, UrlencodedError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use jsonwebtoken::errors::Error as TokenError;
use mongodb::bson::de::Error as BsonDeError;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use redis::RedisError;
use serde::{Serialize, Serializer};
use serde_json::Error as JsonError;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::advertisement::{AdvertisementId, AdvertisementStatus};
use crate::event::EventId;
use crate::notification::NotificationId;
use crate::order::{OrderId, OrderStatus};
use crate::social::FriendRequestId;
use crate::story::StoryId;
use crate::ticket::TicketId;
use crate::user::{Role, UserId};
use crate::vendor::{MenuItemId, VendorId, VendorRequestId};

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidForm(#[derivative(PartialEq = "ignore")] UrlencodedError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    ValidationFailed {
        errors: Vec<FieldViolation>,
    },
    AdvertisementBudgetExhausted {
        advertisement_id: AdvertisementId,
    },
    InvalidAdvertisementStatusTransition {
        advertisement_id: AdvertisementId,
        from: AdvertisementStatus,
        to: AdvertisementStatus,
    },
    AdvertisementNotActive {
        advertisement_id: AdvertisementId,
    },
    CannotDeleteActiveAdvertisement {
        advertisement_id: AdvertisementId,
    },
    VendorHasEvents {
        vendor_id: VendorId,
        event_ids: Vec<EventId>,
    },
    VendorNotApproved {
        vendor_id: VendorId,
    },
    VendorRequestAlreadyPending {
        vendor_id: VendorId,
        event_id: EventId,
        vendor_request_id: VendorRequestId,
    },
    VendorRequestNotPending {
        vendor_request_id: VendorRequestId,
    },
    EventHasTicketsSold {
        event_id: EventId,
        tickets_sold: u32,
    },
    EventCapacityBelowTicketsSold {
        event_id: EventId,
        tickets_sold: u32,
    },
    EventNotOnSale {
        event_id: EventId,
    },
    NotEnoughTickets {
        event_id: EventId,
        requested: u32,
        available: u32,
    },
    TicketNotValid {
        ticket_id: TicketId,
    },
    MenuItemNotAvailable {
        vendor_id: VendorId,
        menu_item_id: MenuItemId,
    },
    EmptyOrder,
    InvalidOrderStatusTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    FriendRequestToSelf,
    FriendRequestAlreadyPending {
        friend_request_id: FriendRequestId,
    },
    AlreadyFriends {
        user_id: UserId,
    },
    FriendRequestNotPending {
        friend_request_id: FriendRequestId,
    },
    CannotFollowSelf,

    // 401
    MissingToken,
    #[serde(serialize_with = "display")]
    InvalidToken(#[derivative(PartialEq = "ignore")] TokenError),
    InvalidCredentials,

    // 403
    InsufficientRole {
        required: Vec<Role>,
        actual: Role,
    },
    NotResourceOwner,
    AccountSuspended {
        user_id: UserId,
    },
    NotFriends {
        user_id: UserId,
    },

    // 404
    PathNotFound,
    UserNotFound {
        user_id: UserId,
    },
    EventNotFound {
        event_id: EventId,
    },
    VendorNotFound {
        vendor_id: VendorId,
    },
    VendorRequestNotFound {
        vendor_request_id: VendorRequestId,
    },
    TicketNotFound {
        ticket_id: TicketId,
    },
    OrderNotFound {
        order_id: OrderId,
    },
    AdvertisementNotFound {
        advertisement_id: AdvertisementId,
    },
    StoryNotFound {
        story_id: StoryId,
    },
    FriendRequestNotFound {
        friend_request_id: FriendRequestId,
    },
    NotificationNotFound {
        notification_id: NotificationId,
    },

    // 409
    EmailAlreadyRegistered {
        email: String,
    },
    ConcurrentModificationDetected,

    // 500
    ExistentialState(String),
    InvalidConfiguration {
        variable: String,
        reason: String,
    },
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    FailedToDeserializeFromBson(#[derivative(PartialEq = "ignore")] BsonDeError),
    #[serde(serialize_with = "display")]
    FailedCacheCall(#[derivative(PartialEq = "ignore")] RedisError),
    #[serde(serialize_with = "display")]
    FailedJsonConversion(#[derivative(PartialEq = "ignore")] JsonError),
    #[serde(serialize_with = "display")]
    FailedToIssueToken(#[derivative(PartialEq = "ignore")] TokenError),
    FailedPasswordHashing(String),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidForm(_) => "E4001002",
            Error::InvalidQuery(_) => "E4001003",
            Error::ValidationFailed { .. } => "E4001004",
            Error::AdvertisementBudgetExhausted { .. } => "E4001005",
            Error::InvalidAdvertisementStatusTransition { .. } => "E4001006",
            Error::AdvertisementNotActive { .. } => "E4001007",
            Error::CannotDeleteActiveAdvertisement { .. } => "E4001008",
            Error::VendorHasEvents { .. } => "E4001009",
            Error::VendorNotApproved { .. } => "E4001010",
            Error::VendorRequestAlreadyPending { .. } => "E4001011",
            Error::VendorRequestNotPending { .. } => "E4001012",
            Error::EventHasTicketsSold { .. } => "E4001013",
            Error::EventCapacityBelowTicketsSold { .. } => "E4001014",
            Error::EventNotOnSale { .. } => "E4001015",
            Error::NotEnoughTickets { .. } => "E4001016",
            Error::TicketNotValid { .. } => "E4001017",
            Error::MenuItemNotAvailable { .. } => "E4001018",
            Error::EmptyOrder => "E4001019",
            Error::InvalidOrderStatusTransition { .. } => "E4001020",
            Error::FriendRequestToSelf => "E4001021",
            Error::FriendRequestAlreadyPending { .. } => "E4001022",
            Error::AlreadyFriends { .. } => "E4001023",
            Error::FriendRequestNotPending { .. } => "E4001024",
            Error::CannotFollowSelf => "E4001025",
            Error::MissingToken => "E4011000",
            Error::InvalidToken(_) => "E4011001",
            Error::InvalidCredentials => "E4011002",
            Error::InsufficientRole { .. } => "E4031000",
            Error::NotResourceOwner => "E4031001",
            Error::AccountSuspended { .. } => "E4031002",
            Error::NotFriends { .. } => "E4031003",
            Error::PathNotFound => "E4041000",
            Error::UserNotFound { .. } => "E4041001",
            Error::EventNotFound { .. } => "E4041002",
            Error::VendorNotFound { .. } => "E4041003",
            Error::VendorRequestNotFound { .. } => "E4041004",
            Error::TicketNotFound { .. } => "E4041005",
            Error::OrderNotFound { .. } => "E4041006",
            Error::AdvertisementNotFound { .. } => "E4041007",
            Error::StoryNotFound { .. } => "E4041008",
            Error::FriendRequestNotFound { .. } => "E4041009",
            Error::NotificationNotFound { .. } => "E4041010",
            Error::EmailAlreadyRegistered { .. } => "E4091000",
            Error::ConcurrentModificationDetected => "E4091001",
            Error::ExistentialState(_) => "E5001000",
            Error::InvalidConfiguration { .. } => "E5001001",
            Error::FailedDatabaseCall(_) => "E5001002",
            Error::FailedToSerializeToBson(_) => "E5001003",
            Error::FailedToDeserializeFromBson(_) => "E5001004",
            Error::FailedCacheCall(_) => "E5001005",
            Error::FailedJsonConversion(_) => "E5001006",
            Error::FailedToIssueToken(_) => "E5001007",
            Error::FailedPasswordHashing(_) => "E5001008",
            Error::IoError(_) => "E5001009",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidForm(_) => "The given form could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::ValidationFailed { .. } => "The request body failed validation",
            Error::AdvertisementBudgetExhausted { .. } => {
                "The advertisement budget has been spent and it cannot be activated"
            }
            Error::InvalidAdvertisementStatusTransition { .. } => {
                "The advertisement cannot move to the requested status"
            }
            Error::AdvertisementNotActive { .. } => "The advertisement is not active",
            Error::CannotDeleteActiveAdvertisement { .. } => {
                "An active advertisement cannot be deleted, pause it first"
            }
            Error::VendorHasEvents { .. } => {
                "The vendor is attached to events and cannot be deleted"
            }
            Error::VendorNotApproved { .. } => "The vendor has not been approved",
            Error::VendorRequestAlreadyPending { .. } => {
                "The vendor already has a pending request for this event"
            }
            Error::VendorRequestNotPending { .. } => "The vendor request was already answered",
            Error::EventHasTicketsSold { .. } => {
                "The event has sold tickets and cannot be deleted"
            }
            Error::EventCapacityBelowTicketsSold { .. } => {
                "The event capacity cannot be lower than the tickets already sold"
            }
            Error::EventNotOnSale { .. } => "Tickets for the event are not on sale",
            Error::NotEnoughTickets { .. } => "The event does not have enough tickets left",
            Error::TicketNotValid { .. } => "The ticket has already been used or cancelled",
            Error::MenuItemNotAvailable { .. } => {
                "The requested menu item does not exist or is not available"
            }
            Error::EmptyOrder => "An order must contain at least one item",
            Error::InvalidOrderStatusTransition { .. } => {
                "The order cannot move to the requested status"
            }
            Error::FriendRequestToSelf => "A friend request cannot be sent to yourself",
            Error::FriendRequestAlreadyPending { .. } => {
                "A friend request between these users is already pending"
            }
            Error::AlreadyFriends { .. } => "The users are already friends",
            Error::FriendRequestNotPending { .. } => "The friend request was already answered",
            Error::CannotFollowSelf => "You cannot follow yourself",
            Error::MissingToken => "The request is missing a bearer token",
            Error::InvalidToken(_) => "The given bearer token is invalid or expired",
            Error::InvalidCredentials => "The email or password is incorrect",
            Error::InsufficientRole { .. } => "Your role does not allow this operation",
            Error::NotResourceOwner => "You do not own the requested resource",
            Error::AccountSuspended { .. } => "The account has been suspended",
            Error::NotFriends { .. } => "Messages can only be sent between friends",
            Error::PathNotFound => "The requested path was not found",
            Error::UserNotFound { .. } => "The requested user was not found",
            Error::EventNotFound { .. } => "The requested event was not found",
            Error::VendorNotFound { .. } => "The requested vendor was not found",
            Error::VendorRequestNotFound { .. } => "The requested vendor request was not found",
            Error::TicketNotFound { .. } => "The requested ticket was not found",
            Error::OrderNotFound { .. } => "The requested order was not found",
            Error::AdvertisementNotFound { .. } => "The requested advertisement was not found",
            Error::StoryNotFound { .. } => "The requested story was not found or has expired",
            Error::FriendRequestNotFound { .. } => "The requested friend request was not found",
            Error::NotificationNotFound { .. } => "The requested notification was not found",
            Error::EmailAlreadyRegistered { .. } => "The email is already registered",
            Error::ConcurrentModificationDetected => {
                "The server detected a concurrent modification"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::InvalidConfiguration { .. } => "The server configuration is invalid",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::FailedToDeserializeFromBson(_) => {
                "An error occurred when deserializing an object from bson"
            }
            Error::FailedCacheCall(_) => "An error occurred when communicating with the cache",
            Error::FailedJsonConversion(_) => "An error occurred when converting json",
            Error::FailedToIssueToken(_) => "An error occurred when issuing a token",
            Error::FailedPasswordHashing(_) => "An error occurred when hashing a password",
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.error_code().get(1..4) {
            Some("400") => StatusCode::BAD_REQUEST,
            Some("401") => StatusCode::UNAUTHORIZED,
            Some("403") => StatusCode::FORBIDDEN,
            Some("404") => StatusCode::NOT_FOUND,
            Some("409") => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Envelope<'a> {
            success: bool,
            message: &'static str,
            error_code: &'static str,
            error_meta: &'a Error,
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        HttpResponse::build(status).json(&Envelope {
            success: false,
            message: self.error_message(),
            error_code: self.error_code(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<BsonDeError> for Error {
    fn from(error: BsonDeError) -> Error {
        Error::FailedToDeserializeFromBson(error)
    }
}

impl From<RedisError> for Error {
    fn from(error: RedisError) -> Error {
        Error::FailedCacheCall(error)
    }
}

impl From<JsonError> for Error {
    fn from(error: JsonError) -> Error {
        Error::FailedJsonConversion(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Error {
        let mut violations = vec![];
        flatten_violations("", &errors, &mut violations);
        violations.sort_by(|a, b| a.field.cmp(&b.field));

        Error::ValidationFailed { errors: violations }
    }
}

fn flatten_violations(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' check", error.code),
                    };
                    out.push(FieldViolation {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_violations(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_violations(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidForm(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::InvalidToken(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::FailedToDeserializeFromBson(err) => Some(err),
            Error::FailedCacheCall(err) => Some(err),
            Error::FailedJsonConversion(err) => Some(err),
            Error::FailedToIssueToken(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

/// Shorthand for a single field violation raised by manager-level checks
/// that the derive-based validators cannot express.
pub fn invalid_field(field: &str, message: &str) -> Error {
    Error::ValidationFailed {
        errors: vec![FieldViolation {
            field: field.to_owned(),
            message: message.to_owned(),
        }],
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
