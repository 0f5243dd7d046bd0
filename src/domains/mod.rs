// Domain components. Each owns one collection and enforces its own invariants.

pub mod event;
pub mod friend;
pub mod location;
pub mod post;
pub mod profile;
pub mod user;

pub use event::{EventDoc, EventMembership, EventUpdate, Facet, Membership, NewEvent};
pub use friend::{FriendRequestDoc, FriendshipDoc, Friendships, RequestStatus};
pub use location::{NearbyPoint, PoiKind, PointOfInterest, ProximityIndex};
pub use post::{PostDoc, PostOptions, PostThread, PostUpdate, Thread};
pub use profile::{ProfileDoc, ProfileRegistry, ProfileUpdate};
pub use user::{PublicUser, UserAccounts};
