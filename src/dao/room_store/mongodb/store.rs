use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{DateTime, Document, doc, serialize_to_bson},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoDisconnectDocument, MongoPairwiseDocument, MongoReportDocument, MongoRoomDocument,
        MongoRoundResultDocument, doc_id, kind_str, pair_record_id, participant_filter,
        uuid_str,
    },
};
use crate::dao::{
    models::{DisconnectMarker, PairwiseRecord, QuizReport, QuizStatDelta, RoundResult},
    room_store::RoomStore,
    storage::StorageResult,
};
use crate::state::room::{
    MemberStatus, ParticipantRef, Profile, ROOM_CAPACITY, Room, RoomHost, RoomMember,
};

const ROOMS: &str = "rooms";
const DISCONNECTS: &str = "disconnects";
const ROUND_RESULTS: &str = "round_results";
const PAIRWISE: &str = "pairwise_records";
const QUIZ_STATS: &str = "quiz_stats";
const QUIZ_REPORTS: &str = "quiz_reports";

/// Server-side safety net for disconnect markers the reaper never got to.
const DISCONNECT_TTL_SECS: u64 = 600;

/// MongoDB-backed implementation of [`RoomStore`].
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    // Database carries its own client handle; swapped wholesale on reconnect.
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.database.read().await;
            guard.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.database.write().await;
        *guard = database;
        Ok(())
    }
}

fn status_str(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Inviting => "inviting",
        MemberStatus::Join => "join",
        MemberStatus::Ready => "ready",
        MemberStatus::Play => "play",
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == 11000,
        ErrorKind::Command(command) => command.code == 11000,
        _ => false,
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // One live marker per participant, plus server-side expiry as the
        // safety net behind the reaper.
        let disconnects = database.collection::<Document>(DISCONNECTS);
        let unique_marker = mongodb::IndexModel::builder()
            .keys(doc! {"who.id": 1, "who.kind": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("disconnect_participant_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        disconnects
            .create_index(unique_marker)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DISCONNECTS,
                index: "who",
                source,
            })?;

        let marker_ttl = mongodb::IndexModel::builder()
            .keys(doc! {"disconnected_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("disconnect_ttl_idx".to_owned()))
                    .expire_after(Some(std::time::Duration::from_secs(DISCONNECT_TTL_SECS)))
                    .build(),
            )
            .build();
        disconnects
            .create_index(marker_ttl)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DISCONNECTS,
                index: "disconnected_at",
                source,
            })?;

        let results = database.collection::<Document>(ROUND_RESULTS);
        let result_round = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "round": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("result_round_idx".to_owned()))
                    .build(),
            )
            .build();
        results
            .create_index(result_round)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROUND_RESULTS,
                index: "room_id,round",
                source,
            })?;

        let reports = database.collection::<Document>(QUIZ_REPORTS);
        let report_round = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "round": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("report_round_idx".to_owned()))
                    .build(),
            )
            .build();
        reports
            .create_index(report_round)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUIZ_REPORTS,
                index: "room_id,round",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.database.read().await;
        guard.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database().await.collection(ROOMS)
    }

    async fn disconnects(&self) -> Collection<MongoDisconnectDocument> {
        self.database().await.collection(DISCONNECTS)
    }

    async fn round_results(&self) -> Collection<MongoRoundResultDocument> {
        self.database().await.collection(ROUND_RESULTS)
    }

    async fn pairwise(&self) -> Collection<MongoPairwiseDocument> {
        self.database().await.collection(PAIRWISE)
    }

    async fn quiz_reports(&self) -> Collection<MongoReportDocument> {
        self.database().await.collection(QUIZ_REPORTS)
    }

    /// Run a conditional room update and hand back the post-update document.
    async fn update_room(
        &self,
        operation: &'static str,
        room_id: Uuid,
        filter: Document,
        update: Document,
    ) -> MongoResult<Option<Room>> {
        let collection = self.rooms().await;
        let updated = collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Room {
                operation,
                id: room_id,
                source,
            })?;
        Ok(updated.map(Into::into))
    }

    async fn insert_room(&self, room: Room) -> MongoResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Room {
                operation: "insert",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<Room>> {
        let document = self
            .rooms()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Room {
                operation: "find",
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn delete_room(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .rooms()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Room {
                operation: "delete",
                id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn append_member(&self, room_id: Uuid, member: RoomMember) -> MongoResult<Option<Room>> {
        let member_bson = serialize_to_bson(&member).map_err(|e| MongoDaoError::Room {
            operation: "append member",
            id: room_id,
            source: e.into(),
        })?;

        // The capacity guard lives in the filter so a racing append cannot
        // push the room past its slot count.
        let mut filter = doc_id(room_id);
        filter.insert(
            "$nor",
            vec![
                participant_filter("host.who", member.who),
                doc! {"members": {"$elemMatch": {
                    "who.id": uuid_str(member.who.id),
                    "who.kind": kind_str(member.who.kind),
                }}},
            ],
        );
        filter.insert(
            "$expr",
            doc! {"$lt": [
                {"$add": [
                    {"$size": "$members"},
                    {"$cond": [{"$eq": ["$host.role", "play"]}, 1, 0]},
                ]},
                ROOM_CAPACITY as i32,
            ]},
        );

        self.update_room(
            "append member",
            room_id,
            filter,
            doc! {"$push": {"members": member_bson}},
        )
        .await
    }

    async fn set_member_status(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        from: MemberStatus,
        to: MemberStatus,
    ) -> MongoResult<Option<Room>> {
        let mut filter = doc_id(room_id);
        filter.insert(
            "members",
            doc! {"$elemMatch": {
                "who.id": uuid_str(who.id),
                "who.kind": kind_str(who.kind),
                "status": status_str(from),
            }},
        );

        self.update_room(
            "set member status",
            room_id,
            filter,
            doc! {"$set": {"members.$.status": status_str(to)}},
        )
        .await
    }

    async fn mark_joined(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        profile: Profile,
    ) -> MongoResult<Option<Room>> {
        let profile_bson = serialize_to_bson(&profile).map_err(|e| MongoDaoError::Room {
            operation: "mark joined",
            id: room_id,
            source: e.into(),
        })?;

        let mut filter = doc_id(room_id);
        filter.insert(
            "members",
            doc! {"$elemMatch": {
                "who.id": uuid_str(who.id),
                "who.kind": kind_str(who.kind),
                "status": status_str(MemberStatus::Inviting),
            }},
        );

        self.update_room(
            "mark joined",
            room_id,
            filter,
            doc! {"$set": {
                "members.$.status": status_str(MemberStatus::Join),
                "members.$.profile": profile_bson,
            }},
        )
        .await
    }

    async fn remove_member(&self, room_id: Uuid, who: ParticipantRef) -> MongoResult<Option<Room>> {
        let mut filter = doc_id(room_id);
        filter.insert(
            "members",
            doc! {"$elemMatch": {
                "who.id": uuid_str(who.id),
                "who.kind": kind_str(who.kind),
            }},
        );

        self.update_room(
            "remove member",
            room_id,
            filter,
            doc! {"$pull": {"members": {
                "who.id": uuid_str(who.id),
                "who.kind": kind_str(who.kind),
            }}},
        )
        .await
    }

    async fn promote_host(
        &self,
        room_id: Uuid,
        old_host: ParticipantRef,
        new_host: RoomHost,
    ) -> MongoResult<Option<Room>> {
        let host_bson = serialize_to_bson(&new_host).map_err(|e| MongoDaoError::Room {
            operation: "promote host",
            id: room_id,
            source: e.into(),
        })?;

        let mut filter = doc_id(room_id);
        filter.extend(participant_filter("host.who", old_host));

        self.update_room(
            "promote host",
            room_id,
            filter,
            doc! {
                "$set": {"host": host_bson},
                "$pull": {"members": {
                    "who.id": uuid_str(new_host.who.id),
                    "who.kind": kind_str(new_host.who.kind),
                }},
            },
        )
        .await
    }

    async fn start_round(&self, room_id: Uuid, host_plays: bool) -> MongoResult<Option<Room>> {
        let mut filter = doc_id(room_id);
        filter.insert("members.0", doc! {"$exists": true});
        filter.insert(
            "members",
            doc! {"$not": {"$elemMatch": {"status": {"$ne": status_str(MemberStatus::Ready)}}}},
        );

        let mut set = doc! {"members.$[].status": status_str(MemberStatus::Play)};
        if host_plays {
            set.insert("host.playing", true);
        }

        self.update_room(
            "start round",
            room_id,
            filter,
            doc! {"$set": set, "$inc": {"round": 1}},
        )
        .await
    }

    async fn clear_host_playing(&self, room_id: Uuid) -> MongoResult<Option<Room>> {
        let mut filter = doc_id(room_id);
        filter.insert("host.playing", true);

        self.update_room(
            "clear host playing",
            room_id,
            filter,
            doc! {"$set": {"host.playing": false}},
        )
        .await
    }

    async fn set_quiz(&self, room_id: Uuid, quiz_id: Uuid) -> MongoResult<Option<Room>> {
        self.update_room(
            "set quiz",
            room_id,
            doc_id(room_id),
            doc! {"$set": {"quiz_id": uuid_str(quiz_id)}},
        )
        .await
    }

    async fn upsert_disconnect(&self, marker: DisconnectMarker) -> MongoResult<()> {
        let document: MongoDisconnectDocument = marker.clone().into();
        let document_bson = serialize_to_bson(&document).map_err(|e| {
            MongoDaoError::op("serialize disconnect", DISCONNECTS, e.into())
        })?;
        let mongodb::bson::Bson::Document(mut fields) = document_bson else {
            // serialize_to_bson of a struct always yields a document
            return Ok(());
        };
        let id = fields.remove("_id");

        let mut update = doc! {"$set": fields};
        if let Some(id) = id {
            update.insert("$setOnInsert", doc! {"_id": id});
        }

        self.disconnects()
            .await
            .update_one(participant_filter("who", marker.who), update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::op("upsert", DISCONNECTS, source))?;
        Ok(())
    }

    async fn delete_disconnect(&self, who: ParticipantRef, room_id: Uuid) -> MongoResult<()> {
        let mut filter = participant_filter("who", who);
        filter.insert("room_id", uuid_str(room_id));
        self.disconnects()
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::op("delete", DISCONNECTS, source))?;
        Ok(())
    }

    async fn expired_disconnects(&self, cutoff: SystemTime) -> MongoResult<Vec<DisconnectMarker>> {
        let documents: Vec<MongoDisconnectDocument> = self
            .disconnects()
            .await
            .find(doc! {"disconnected_at": {"$lte": DateTime::from_system_time(cutoff)}})
            .await
            .map_err(|source| MongoDaoError::op("find expired", DISCONNECTS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::op("find expired", DISCONNECTS, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_disconnects(&self, ids: Vec<Uuid>) -> MongoResult<()> {
        let ids: Vec<_> = ids.into_iter().map(uuid_str).collect();
        self.disconnects()
            .await
            .delete_many(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::op("delete consumed", DISCONNECTS, source))?;
        Ok(())
    }

    async fn insert_round_result(&self, result: RoundResult) -> MongoResult<()> {
        let document: MongoRoundResultDocument = result.into();
        self.round_results()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::op("insert", ROUND_RESULTS, source))?;
        Ok(())
    }

    async fn find_round_results(&self, room_id: Uuid, round: u32) -> MongoResult<Vec<RoundResult>> {
        let documents: Vec<MongoRoundResultDocument> = self
            .round_results()
            .await
            .find(doc! {"room_id": uuid_str(room_id), "round": round})
            .await
            .map_err(|source| MongoDaoError::op("find", ROUND_RESULTS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::op("find", ROUND_RESULTS, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn set_round_rank(&self, id: Uuid, rank: u32) -> MongoResult<()> {
        self.round_results()
            .await
            .update_one(doc_id(id), doc! {"$set": {"rank": rank}})
            .await
            .map_err(|source| MongoDaoError::op("set rank", ROUND_RESULTS, source))?;
        Ok(())
    }

    async fn find_pairwise(
        &self,
        a: ParticipantRef,
        b: ParticipantRef,
    ) -> MongoResult<Option<PairwiseRecord>> {
        let filter = doc! {"$and": [
            {"$or": [participant_filter("from", a), participant_filter("from", b)]},
            {"$or": [participant_filter("to", a), participant_filter("to", b)]},
        ]};

        let document = self
            .pairwise()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::op("find", PAIRWISE, source))?;
        Ok(document.map(Into::into))
    }

    async fn apply_pairwise(
        &self,
        existing_id: Option<Uuid>,
        from: ParticipantRef,
        to: ParticipantRef,
        from_side_won: bool,
        room_id: Uuid,
        round: u32,
    ) -> MongoResult<Option<PairwiseRecord>> {
        let not_stamped = doc! {"$or": [
            {"last_room_id": {"$ne": uuid_str(room_id)}},
            {"last_round": {"$ne": round}},
        ]};
        let update = doc! {
            "$setOnInsert": {
                "from": serialize_to_bson(&from)
                    .map_err(|e| MongoDaoError::op("serialize", PAIRWISE, e.into()))?,
                "to": serialize_to_bson(&to)
                    .map_err(|e| MongoDaoError::op("serialize", PAIRWISE, e.into()))?,
            },
            "$set": {
                "last_room_id": uuid_str(room_id),
                "last_round": round,
            },
            "$inc": {
                "all": 1,
                "win": if from_side_won { 1 } else { 0 },
            },
        };

        let collection = self.pairwise().await;
        let operation = match existing_id {
            Some(id) => {
                let mut filter = doc_id(id);
                filter.extend(not_stamped);
                collection
                    .find_one_and_update(filter, update)
                    .return_document(ReturnDocument::After)
                    .await
            }
            None => {
                let mut filter = doc_id(pair_record_id(from, to));
                filter.extend(not_stamped);
                collection
                    .find_one_and_update(filter, update)
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .await
            }
        };

        match operation {
            Ok(document) => Ok(document.map(Into::into)),
            // A concurrent replay created or stamped the record first.
            Err(err) if is_duplicate_key(&err) => Ok(None),
            Err(source) => Err(MongoDaoError::op("apply", PAIRWISE, source)),
        }
    }

    async fn bump_quiz_stats(&self, quiz_id: Uuid, delta: QuizStatDelta) -> MongoResult<()> {
        let mut inc = doc! {
            "stat_count": 1,
            "age_learn_sum": delta.age_learn,
            "age_cognitive_sum": delta.age_cognitive,
            "age_activity_sum": delta.age_activity,
        };
        for question in &delta.questions {
            if question.tries > 0 {
                inc.insert(format!("question.{}.try_count", question.pos), question.tries);
            }
            if question.correct > 0 {
                inc.insert(
                    format!("question.{}.correct_count", question.pos),
                    question.correct,
                );
            }
        }

        self.database()
            .await
            .collection::<Document>(QUIZ_STATS)
            .update_one(doc_id(quiz_id), doc! {"$inc": inc})
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::op("bump", QUIZ_STATS, source))?;
        Ok(())
    }

    async fn insert_quiz_reports(&self, reports: Vec<QuizReport>) -> MongoResult<()> {
        if reports.is_empty() {
            return Ok(());
        }
        let documents: Vec<MongoReportDocument> = reports.into_iter().map(Into::into).collect();
        self.quiz_reports()
            .await
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::op("insert", QUIZ_REPORTS, source))?;
        Ok(())
    }

    async fn find_quiz_reports(&self, room_id: Uuid, round: u32) -> MongoResult<Vec<QuizReport>> {
        let documents: Vec<MongoReportDocument> = self
            .quiz_reports()
            .await
            .find(doc! {"room_id": uuid_str(room_id), "round": round})
            .await
            .map_err(|source| MongoDaoError::op("find", QUIZ_REPORTS, source))?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::op("find", QUIZ_REPORTS, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: Room) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(id).await.map_err(Into::into) })
    }

    fn append_member(
        &self,
        room_id: Uuid,
        member: RoomMember,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move { store.append_member(room_id, member).await.map_err(Into::into) })
    }

    fn set_member_status(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        from: MemberStatus,
        to: MemberStatus,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_member_status(room_id, who, from, to)
                .await
                .map_err(Into::into)
        })
    }

    fn mark_joined(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
        profile: Profile,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_joined(room_id, who, profile)
                .await
                .map_err(Into::into)
        })
    }

    fn remove_member(
        &self,
        room_id: Uuid,
        who: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move { store.remove_member(room_id, who).await.map_err(Into::into) })
    }

    fn promote_host(
        &self,
        room_id: Uuid,
        old_host: ParticipantRef,
        new_host: RoomHost,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .promote_host(room_id, old_host, new_host)
                .await
                .map_err(Into::into)
        })
    }

    fn start_round(
        &self,
        room_id: Uuid,
        host_plays: bool,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .start_round(room_id, host_plays)
                .await
                .map_err(Into::into)
        })
    }

    fn clear_host_playing(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move { store.clear_host_playing(room_id).await.map_err(Into::into) })
    }

    fn set_quiz(
        &self,
        room_id: Uuid,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Room>>> {
        let store = self.clone();
        Box::pin(async move { store.set_quiz(room_id, quiz_id).await.map_err(Into::into) })
    }

    fn upsert_disconnect(&self, marker: DisconnectMarker) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_disconnect(marker).await.map_err(Into::into) })
    }

    fn delete_disconnect(
        &self,
        who: ParticipantRef,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_disconnect(who, room_id)
                .await
                .map_err(Into::into)
        })
    }

    fn expired_disconnects(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<DisconnectMarker>>> {
        let store = self.clone();
        Box::pin(async move { store.expired_disconnects(cutoff).await.map_err(Into::into) })
    }

    fn delete_disconnects(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_disconnects(ids).await.map_err(Into::into) })
    }

    fn insert_round_result(&self, result: RoundResult) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_round_result(result).await.map_err(Into::into) })
    }

    fn round_results(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundResult>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_round_results(room_id, round)
                .await
                .map_err(Into::into)
        })
    }

    fn set_round_rank(&self, id: Uuid, rank: u32) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.set_round_rank(id, rank).await.map_err(Into::into) })
    }

    fn find_pairwise(
        &self,
        a: ParticipantRef,
        b: ParticipantRef,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.find_pairwise(a, b).await.map_err(Into::into) })
    }

    fn apply_pairwise(
        &self,
        existing_id: Option<Uuid>,
        from: ParticipantRef,
        to: ParticipantRef,
        from_side_won: bool,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PairwiseRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .apply_pairwise(existing_id, from, to, from_side_won, room_id, round)
                .await
                .map_err(Into::into)
        })
    }

    fn bump_quiz_stats(
        &self,
        quiz_id: Uuid,
        delta: QuizStatDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .bump_quiz_stats(quiz_id, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_quiz_reports(
        &self,
        reports: Vec<QuizReport>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_quiz_reports(reports).await.map_err(Into::into) })
    }

    fn quiz_reports(
        &self,
        room_id: Uuid,
        round: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<QuizReport>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_quiz_reports(room_id, round)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
