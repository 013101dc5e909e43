//! Tempus records API client.
//!
//! Fetches the map catalog, per-zone leaderboards and single-player zone
//! completions. All API specifics are isolated in this module so endpoint
//! changes are easy to fix.
//!
//! Every response type rejects unknown fields. Schema drift upstream must
//! surface as a decode error rather than silently dropping data.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::fetch::{FetchError, Fetcher};
use crate::models::{CatalogMap, Class, MapId, PlayerId, ZoneCounts, ZoneKey, ZoneKind};

/// Default API root.
pub const DEFAULT_API_BASE: &str = "https://tempus2.xyz/api/v0";

/// `limit=0` asks the records endpoint for every record on the zone.
pub const ALL_RECORDS: u32 = 0;

// ── Map catalog ─────────────────────────────────────────────────────────────

/// One map from `/maps/detailedList`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedMap {
    pub id: MapId,
    pub name: String,
    pub zone_counts: DetailedZoneCounts,
    pub authors: Vec<MapAuthor>,
    pub tier_info: ClassTiers,
    pub videos: MapVideos,
}

impl DetailedMap {
    pub fn to_catalog_map(&self) -> CatalogMap {
        CatalogMap {
            id: self.id,
            name: self.name.clone(),
            zone_counts: ZoneCounts {
                map: self.zone_counts.map,
                course: self.zone_counts.course,
                bonus: self.zone_counts.bonus,
                trick: self.zone_counts.trick,
            },
            soldier_tier: self.tier_info.soldier,
            demoman_tier: self.tier_info.demoman,
        }
    }
}

/// Zone counts by type. Only map, course, bonus and trick are tracked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedZoneCounts {
    #[serde(default)]
    pub checkpoint: u8,
    #[serde(default)]
    pub bonus_end: u8,
    #[serde(default)]
    pub linear: u8,
    #[serde(default)]
    pub bonus: u8,
    #[serde(default)]
    pub map_end: u8,
    #[serde(default)]
    pub map: u8,
    #[serde(default)]
    pub trick: u8,
    #[serde(default)]
    pub misc: u8,
    #[serde(default)]
    pub special: u8,
    #[serde(default)]
    pub course: u8,
    #[serde(default)]
    pub course_end: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapAuthor {
    pub map_id: MapId,
    pub name: String,
    pub id: u64,
}

/// Tier per class, keyed by the API's numeric class id.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassTiers {
    #[serde(rename = "3")]
    pub soldier: u8,
    #[serde(rename = "4")]
    pub demoman: u8,
}

impl ClassTiers {
    pub fn get(&self, class: Class) -> u8 {
        match class {
            Class::Soldier => self.soldier,
            Class::Demoman => self.demoman,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapVideos {
    pub soldier: Option<String>,
    pub demoman: Option<String>,
}

// ── Zone records ────────────────────────────────────────────────────────────

/// Zone identity as echoed back by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneInfo {
    pub id: u64,
    pub map_id: MapId,
    pub zoneindex: u8,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ZoneKind,
}

/// Authoritative completion counts per class.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionInfo {
    pub soldier: u32,
    pub demoman: u32,
}

impl CompletionInfo {
    pub fn get(&self, class: Class) -> u32 {
        match class {
            Class::Soldier => self.soldier,
            Class::Demoman => self.demoman,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerInfo {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoInfo {
    pub id: u64,
    pub start_tick: Option<u64>,
    pub end_tick: Option<u64>,
    pub url: Option<String>,
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub steamid: String,
    pub name: String,
}

/// A single leaderboard entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordEntry {
    pub id: u64,
    pub zone_id: u64,
    pub class: u8,
    pub user_id: u64,
    pub steamid: String,
    pub name: String,
    pub player_info: PlayerInfo,
    pub demo_info: Option<DemoInfo>,
    /// Seconds
    pub duration: f64,
    /// Unix seconds
    pub date: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassRecords {
    pub soldier: Vec<RecordEntry>,
    pub demoman: Vec<RecordEntry>,
}

impl ClassRecords {
    pub fn get(&self, class: Class) -> &[RecordEntry] {
        match class {
            Class::Soldier => &self.soldier,
            Class::Demoman => &self.demoman,
        }
    }
}

/// Response of `/maps/id/{id}/zones/typeindex/{kind}/{index}/records/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneRecordsResponse {
    pub zone_info: ZoneInfo,
    pub tier_info: ClassTiers,
    pub completion_info: CompletionInfo,
    pub results: ClassRecords,
}

/// Response of `/maps/name/{name}/zones/typeindex/{kind}/{index}/records/player/{id}/{class}`.
///
/// `result` is absent when the player has not finished the zone.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerZoneCompletionResponse {
    pub zone_info: ZoneInfo,
    pub tier_info: ClassTiers,
    pub completion_info: CompletionInfo,
    pub result: Option<RecordEntry>,
}

/// One player × zone × class lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerZoneQuery {
    pub map_name: String,
    pub zone: ZoneKey,
    pub player_id: PlayerId,
    pub class: Class,
}

impl std::fmt::Display for PlayerZoneQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "player {} {} {} {} {}",
            self.player_id, self.map_name, self.zone.kind, self.zone.index, self.class
        )
    }
}

// ── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchPlayer {
    pub steamid: String,
    pub id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchMap {
    pub id: MapId,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchResponse {
    pub players: Vec<SearchPlayer>,
    pub maps: Vec<SearchMap>,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Read-only source of completion data.
#[async_trait]
pub trait RecordsSource: Send + Sync {
    /// Full map catalog with zone counts and class tiers.
    async fn detailed_map_list(&self) -> Result<Vec<DetailedMap>, FetchError>;

    /// Leaderboard for one zone. `limit = 0` returns every record.
    async fn zone_records(&self, zone: ZoneKey, limit: u32) -> Result<ZoneRecordsResponse, FetchError>;

    /// One player's completion state for one zone and class.
    async fn player_zone_completion(
        &self,
        query: &PlayerZoneQuery,
    ) -> Result<PlayerZoneCompletionResponse, FetchError>;

    async fn search_players_and_maps(&self, name: &str) -> Result<SearchResponse, FetchError>;
}

/// HTTP implementation of [`RecordsSource`].
pub struct RecordsClient {
    fetcher: Fetcher,
    api_base: String,
}

impl RecordsClient {
    /// Create a new records client.
    pub fn new(fetcher: Fetcher, api_base: &str) -> Self {
        let api_base = if api_base.is_empty() {
            DEFAULT_API_BASE
        } else {
            api_base
        };

        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        Ok(Url::parse(&format!("{}{}", self.api_base, path))?)
    }

    fn zone_records_url(&self, zone: ZoneKey, limit: u32) -> Result<Url, FetchError> {
        self.url(&format!(
            "/maps/id/{}/zones/typeindex/{}/{}/records/list?limit={}",
            zone.map_id, zone.kind, zone.index, limit
        ))
    }

    fn player_zone_url(&self, query: &PlayerZoneQuery) -> Result<Url, FetchError> {
        let mut url = self.url("/maps/name")?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(&query.map_name)
            .extend(["zones", "typeindex", query.zone.kind.as_str()])
            .push(&query.zone.index.to_string())
            .extend(["records", "player"])
            .push(&query.player_id.to_string())
            .push(&query.class.api_id().to_string());
        Ok(url)
    }

    fn search_url(&self, name: &str) -> Result<Url, FetchError> {
        let mut url = self.url("/search/playersAndMaps")?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(name);
        Ok(url)
    }
}

#[async_trait]
impl RecordsSource for RecordsClient {
    async fn detailed_map_list(&self) -> Result<Vec<DetailedMap>, FetchError> {
        let url = self.url("/maps/detailedList")?;
        let maps: Vec<DetailedMap> = self.fetcher.get_json(&url).await?;

        info!("Tempus: found {} maps", maps.len());
        Ok(maps)
    }

    async fn zone_records(&self, zone: ZoneKey, limit: u32) -> Result<ZoneRecordsResponse, FetchError> {
        let url = self.zone_records_url(zone, limit)?;
        self.fetcher.get_json(&url).await
    }

    async fn player_zone_completion(
        &self,
        query: &PlayerZoneQuery,
    ) -> Result<PlayerZoneCompletionResponse, FetchError> {
        let url = self.player_zone_url(query)?;
        self.fetcher.get_json(&url).await
    }

    async fn search_players_and_maps(&self, name: &str) -> Result<SearchResponse, FetchError> {
        let url = self.search_url(name)?;
        self.fetcher.get_json(&url).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::FetcherConfig;
    use axum::extract::Path;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    pub(crate) fn record_json(player_id: u64, rank: u32, duration: f64) -> Value {
        json!({
            "id": 9000 + player_id,
            "zone_id": 55,
            "class": 3,
            "user_id": player_id,
            "steamid": format!("STEAM_0:1:{}", player_id),
            "name": format!("player{}", player_id),
            "player_info": {
                "id": player_id,
                "steamid": format!("STEAM_0:1:{}", player_id),
                "name": format!("player{}", player_id)
            },
            "demo_info": null,
            "duration": duration,
            "date": 1_600_000_000.0,
            "rank": rank
        })
    }

    pub(crate) fn zone_records_json(map_id: u64, kind: &str, index: u8) -> Value {
        json!({
            "zone_info": {
                "id": 55,
                "map_id": map_id,
                "zoneindex": index,
                "custom_name": null,
                "type": kind
            },
            "tier_info": { "3": 4, "4": 2 },
            "completion_info": { "soldier": 2, "demoman": 0 },
            "results": {
                "soldier": [record_json(1, 1, 80.5), record_json(2, 2, 95.0)],
                "demoman": []
            }
        })
    }

    fn detailed_list_json() -> Value {
        json!([{
            "id": 12,
            "name": "jump_beef",
            "zone_counts": { "map": 1, "course": 2, "bonus": 1, "trick": 0, "checkpoint": 5 },
            "authors": [{ "map_id": 12, "name": "someone", "id": 3 }],
            "tier_info": { "3": 3, "4": 5 },
            "videos": { "soldier": "abc", "demoman": null }
        }])
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v0", addr)
    }

    fn client(base: &str) -> RecordsClient {
        RecordsClient::new(Fetcher::new(FetcherConfig::default()).unwrap(), base)
    }

    #[test]
    fn test_default_api_base() {
        let client = client("");
        assert_eq!(client.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_zone_records_url() {
        let client = client("https://tempus2.xyz/api/v0/");
        let zone = ZoneKey {
            map_id: 12,
            kind: ZoneKind::Bonus,
            index: 2,
        };

        let url = client.zone_records_url(zone, ALL_RECORDS).unwrap();
        assert_eq!(
            url.as_str(),
            "https://tempus2.xyz/api/v0/maps/id/12/zones/typeindex/bonus/2/records/list?limit=0"
        );
    }

    #[test]
    fn test_player_zone_url() {
        let client = client(DEFAULT_API_BASE);
        let query = PlayerZoneQuery {
            map_name: "jump_beef".to_string(),
            zone: ZoneKey {
                map_id: 12,
                kind: ZoneKind::Course,
                index: 3,
            },
            player_id: 777,
            class: Class::Demoman,
        };

        let url = client.player_zone_url(&query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://tempus2.xyz/api/v0/maps/name/jump_beef/zones/typeindex/course/3/records/player/777/4"
        );
    }

    #[test]
    fn test_search_url_encodes_name() {
        let client = client(DEFAULT_API_BASE);
        let url = client.search_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://tempus2.xyz/api/v0/search/playersAndMaps/a%20b%2Fc"
        );
    }

    #[test]
    fn test_zone_records_decode() {
        let response: ZoneRecordsResponse =
            serde_json::from_value(zone_records_json(12, "map", 1)).unwrap();

        assert_eq!(response.zone_info.kind, ZoneKind::Map);
        assert_eq!(response.tier_info.get(Class::Soldier), 4);
        assert_eq!(response.completion_info.get(Class::Soldier), 2);
        assert_eq!(response.results.get(Class::Soldier).len(), 2);
        assert_eq!(response.results.soldier[0].player_info.id, 1);
    }

    #[test]
    fn test_zone_records_rejects_unknown_fields() {
        let mut value = zone_records_json(12, "map", 1);
        value["surprise"] = json!(true);

        assert!(serde_json::from_value::<ZoneRecordsResponse>(value).is_err());
    }

    #[test]
    fn test_zone_records_rejects_unknown_zone_kind() {
        let value = zone_records_json(12, "checkpoint", 1);
        assert!(serde_json::from_value::<ZoneRecordsResponse>(value).is_err());
    }

    #[test]
    fn test_player_completion_without_result() {
        let value = json!({
            "zone_info": { "id": 1, "map_id": 3, "zoneindex": 1, "custom_name": "", "type": "bonus" },
            "tier_info": { "3": 1, "4": 1 },
            "completion_info": { "soldier": 10, "demoman": 4 },
            "result": null
        });

        let response: PlayerZoneCompletionResponse = serde_json::from_value(value).unwrap();
        assert!(response.result.is_none());
    }

    #[test]
    fn test_detailed_map_to_catalog() {
        let maps: Vec<DetailedMap> = serde_json::from_value(detailed_list_json()).unwrap();
        let catalog = maps[0].to_catalog_map();

        assert_eq!(catalog.id, 12);
        assert_eq!(catalog.zone_counts.course, 2);
        assert_eq!(catalog.soldier_tier, 3);
        assert_eq!(catalog.demoman_tier, 5);
        assert_eq!(catalog.zones().len(), 4);
    }

    #[tokio::test]
    async fn test_client_against_fixture_server() {
        let router = Router::new()
            .route(
                "/api/v0/maps/detailedList",
                get(|| async { Json(detailed_list_json()) }),
            )
            .route(
                "/api/v0/maps/id/:id/zones/typeindex/:kind/:index/records/list",
                get(|Path((id, kind, index)): Path<(u64, String, u8)>| async move {
                    Json(zone_records_json(id, &kind, index))
                }),
            )
            .route(
                "/api/v0/search/playersAndMaps/:name",
                get(|Path(name): Path<String>| async move {
                    Json(json!({
                        "players": [{ "steamid": "STEAM_0:0:1", "id": 5, "name": name }],
                        "maps": []
                    }))
                }),
            );
        let base = serve(router).await;
        let client = client(&base);

        let maps = client.detailed_map_list().await.unwrap();
        assert_eq!(maps.len(), 1);

        let zone = ZoneKey {
            map_id: 12,
            kind: ZoneKind::Course,
            index: 2,
        };
        let records = client.zone_records(zone, ALL_RECORDS).await.unwrap();
        assert_eq!(records.zone_info.map_id, 12);
        assert_eq!(records.zone_info.kind, ZoneKind::Course);
        assert_eq!(records.zone_info.zoneindex, 2);

        let search = client.search_players_and_maps("rocket").await.unwrap();
        assert_eq!(search.players[0].name, "rocket");
    }

    #[tokio::test]
    async fn test_client_surfaces_schema_drift() {
        let router = Router::new().route(
            "/api/v0/maps/detailedList",
            get(|| async { Json(json!([{ "id": 1, "name": "x", "new_field": 1 }])) }),
        );
        let base = serve(router).await;

        let err = client(&base).detailed_map_list().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
