//! Blocking REST client for an OpenMRS-style EMR.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::fhir::Bundle;
use super::{
    DischargeSearch, DischargedEncounterPage, EmrApi, EmrError, EmrResult, EncounterView,
};
use crate::config::EmrConnection;
use crate::models::{
    AdmissionLocation, BedAssignment, Bill, Concept, DispositionType, Encounter, EncounterPayload,
    InpatientAdmission, InpatientRequest, Location, ResourceRef, Visit,
};

const REST_PATH: &str = "ws/rest/v1";
const FHIR_PATH: &str = "ws/fhir2/R4";

/// Upper bound on followed `next` links for one listing.
const MAX_PAGES: usize = 200;

pub const ADMISSION_LOCATION_REP: &str = "custom:(ward,totalBeds,occupiedBeds,bedLayouts:(rowNumber,bedType,columnNumber,bedNumber,bedId,bedUuid,status,location,patients:(person:full,identifiers,uuid)))";

pub const ADMISSION_LOCATIONS_REP: &str = "custom:(ward:(uuid,display,tags),totalBeds,occupiedBeds,bedLayouts:(bedNumber,bedId,status,patients:(uuid,display)))";

pub const INPATIENT_ADMISSION_REP: &str = concat!(
    "custom:(visit:(",
    "uuid,display,patient:(uuid,display),visitType,indication,location,startDatetime,stopDatetime,",
    "attributes,voided,encounters:(uuid,display,encounterDatetime,obs:(uuid,display,concept:(uuid,display),",
    "obsDatetime,value),encounterType:(uuid,display))),patient:(uuid,identifiers:(uuid,display,identifier,identifierType)",
    ",voided,person:(uuid,display,gender,age,birthdate,birthtime,preferredName,preferredAddress,dead,deathDate)),",
    "encounterAssigningToCurrentInpatientLocation:(encounterDatetime),",
    "currentInpatientRequest:(dispositionLocation,dispositionType,disposition:(uuid,display),",
    "dispositionEncounter:(uuid,display),dispositionObsGroup:(uuid,display),visit:(uuid),patient:(uuid)),",
    "firstAdmissionOrTransferEncounter:(encounterDatetime),currentInpatientLocation)"
);

pub const INPATIENT_REQUEST_REP: &str = concat!(
    "custom:(",
    "dispositionLocation,dispositionType,disposition,dispositionEncounter:full,",
    "patient:(uuid,identifiers,voided,",
    "person:(uuid,display,gender,age,birthdate,birthtime,preferredName,preferredAddress,dead,deathDate)),",
    "dispositionObsGroup,visit)"
);

pub const CONCEPT_REP: &str =
    "custom:(uuid,display,hiNormal,lowNormal,setMembers:(uuid,display,hiNormal,lowNormal))";

pub const CONCEPT_SEARCH_REP: &str = "custom:(uuid,display,name:(uuid,display),mappings:(conceptReferenceTerm:(code,name,conceptSource:(uuid))))";

pub const LOCATION_TAGS_REP: &str = "custom:(uuid,display,tags:(uuid,display))";

pub const ACTIVE_VISIT_REP: &str = "custom:(uuid,display,visitType:(uuid,display),startDatetime,stopDatetime,encounters:(uuid,display,encounterDatetime,encounterType:(uuid,display),location:(uuid,display),form:(uuid,display)))";

pub const PATIENT_ENCOUNTER_REP: &str = "custom:(uuid,display,encounterDatetime,obs:full,form:(uuid,display),encounterType:(uuid,display),location:(uuid,display),orders:(uuid,display),diagnoses:(uuid,display))";

pub const PROVIDER_REP: &str = "custom:(uuid,display)";

pub const BILL_REP: &str = "custom:(uuid,display,voided,status,dateCreated,patient:(uuid,display),lineItems:(uuid,billableService,quantity,price,paymentStatus))";

pub const BED_REP: &str = "custom:(id,number,physicalLocation:(uuid,display))";

#[derive(Deserialize)]
struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct Link {
    rel: String,
    uri: String,
}

/// REST/FHIR client authenticating with HTTP basic auth.
pub struct RestEmrClient {
    client: Client,
    connection: EmrConnection,
    bed_management: OnceLock<bool>,
}

impl RestEmrClient {
    pub fn new(connection: EmrConnection) -> EmrResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(connection.timeout_secs))
            .build()?;
        let bed_management = OnceLock::new();
        if let Some(installed) = connection.bed_management {
            let _ = bed_management.set(installed);
        }
        Ok(Self {
            client,
            connection,
            bed_management,
        })
    }

    fn base(&self) -> &str {
        self.connection.base_url.trim_end_matches('/')
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base(), REST_PATH, path)
    }

    fn fhir_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base(), FHIR_PATH, path)
    }

    fn send(&self, request: RequestBuilder) -> EmrResult<String> {
        let response = request
            .basic_auth(&self.connection.username, Some(&self.connection.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            warn!(code = status.as_u16(), "EMR request failed");
            return Err(EmrError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> EmrResult<T> {
        debug!(url, "GET");
        let body = self.send(self.client.get(url).query(query))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch every page of a paginated REST listing.
    fn get_all<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> EmrResult<Vec<T>> {
        let mut page: ResultsPage<T> = self.get_json(url, query)?;
        let mut results = std::mem::take(&mut page.results);
        let mut fetched = 1;
        while let Some(next) = page.links.iter().find(|l| l.rel == "next").map(|l| l.uri.clone()) {
            if fetched >= MAX_PAGES {
                return Err(EmrError::Unexpected(format!(
                    "listing at {url} exceeded {MAX_PAGES} pages"
                )));
            }
            page = self.get_json(&next, &[])?;
            results.append(&mut page.results);
            fetched += 1;
        }
        Ok(results)
    }

    fn detect_bed_management(&self) -> bool {
        match self.send(self.client.get(self.rest_url("module/bedmanagement"))) {
            Ok(_) => true,
            Err(err) => {
                if !err.is_not_found() {
                    warn!(error = %err, "bed management check failed, assuming not installed");
                }
                false
            }
        }
    }
}

fn join_types(types: &[DispositionType]) -> String {
    types
        .iter()
        .map(DispositionType::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl EmrApi for RestEmrClient {
    fn is_bed_management_installed(&self) -> bool {
        *self.bed_management.get_or_init(|| self.detect_bed_management())
    }

    fn admission_location(&self, location_uuid: &str) -> EmrResult<AdmissionLocation> {
        self.get_json(
            &self.rest_url(&format!("admissionLocation/{location_uuid}")),
            &[("v", ADMISSION_LOCATION_REP)],
        )
    }

    fn admission_locations(&self) -> EmrResult<Vec<AdmissionLocation>> {
        self.get_all(
            &self.rest_url("admissionLocation"),
            &[("v", ADMISSION_LOCATIONS_REP)],
        )
    }

    fn inpatient_admissions(&self, location_uuid: &str) -> EmrResult<Vec<InpatientAdmission>> {
        self.get_all(
            &self.rest_url("emrapi/inpatient/admission"),
            &[
                ("currentInpatientLocation", location_uuid),
                ("v", INPATIENT_ADMISSION_REP),
            ],
        )
    }

    fn inpatient_requests(
        &self,
        location_uuid: &str,
        types: &[DispositionType],
    ) -> EmrResult<Vec<InpatientRequest>> {
        let types = join_types(types);
        self.get_all(
            &self.rest_url("emrapi/inpatient/request"),
            &[
                ("dispositionType", types.as_str()),
                ("dispositionLocation", location_uuid),
                ("v", INPATIENT_REQUEST_REP),
            ],
        )
    }

    fn discharge_encounters(&self, search: &DischargeSearch) -> EmrResult<DischargedEncounterPage> {
        let count = search.page_size.to_string();
        let offset = (search.page.saturating_sub(1) * search.page_size).to_string();
        let bundle: Bundle = self.get_json(
            &self.fhir_url("Encounter"),
            &[
                ("_summary", "data"),
                ("type", search.encounter_type.as_str()),
                ("location", search.location_uuid.as_str()),
                ("_count", count.as_str()),
                ("_getpagesoffset", offset.as_str()),
                ("_total", "accurate"),
            ],
        )?;
        Ok(bundle.into())
    }

    fn encounter_with_visit(&self, encounter_uuid: &str, view: EncounterView) -> EmrResult<Encounter> {
        self.get_json(
            &self.rest_url(&format!("encounter/{encounter_uuid}")),
            &[("v", view.representation())],
        )
    }

    fn concept(&self, concept_uuid: &str) -> EmrResult<Concept> {
        self.get_json(
            &self.rest_url(&format!("concept/{concept_uuid}")),
            &[("v", CONCEPT_REP)],
        )
    }

    fn location(&self, location_uuid: &str) -> EmrResult<Location> {
        self.get_json(
            &self.rest_url(&format!("location/{location_uuid}")),
            &[("v", LOCATION_TAGS_REP)],
        )
    }

    fn active_visit(&self, patient_uuid: &str) -> EmrResult<Option<Visit>> {
        let page: ResultsPage<Visit> = self.get_json(
            &self.rest_url("visit"),
            &[
                ("patient", patient_uuid),
                ("includeInactive", "false"),
                ("v", ACTIVE_VISIT_REP),
            ],
        )?;
        Ok(page.results.into_iter().next())
    }

    fn patient_encounters(&self, patient_uuid: &str) -> EmrResult<Vec<Encounter>> {
        self.get_all(
            &self.rest_url("encounter"),
            &[("patient", patient_uuid), ("v", PATIENT_ENCOUNTER_REP)],
        )
    }

    fn patient_requests(
        &self,
        patient_uuid: &str,
        types: &[DispositionType],
    ) -> EmrResult<Vec<InpatientRequest>> {
        let types = join_types(types);
        self.get_all(
            &self.rest_url("emrapi/inpatient/request"),
            &[
                ("dispositionType", types.as_str()),
                ("patients", patient_uuid),
                ("v", INPATIENT_REQUEST_REP),
            ],
        )
    }

    fn search_concepts(&self, query: &str, source_uuid: &str) -> EmrResult<Vec<Concept>> {
        self.get_all(
            &self.rest_url("concept"),
            &[("q", query), ("references", source_uuid), ("v", CONCEPT_SEARCH_REP)],
        )
    }

    fn providers(&self) -> EmrResult<Vec<ResourceRef>> {
        self.get_all(&self.rest_url("provider"), &[("v", PROVIDER_REP)])
    }

    fn create_encounter(&self, payload: &EncounterPayload) -> EmrResult<Encounter> {
        debug!(patient = %payload.patient, encounter_type = %payload.encounter_type, "POST encounter");
        let body = self.send(self.client.post(self.rest_url("encounter")).json(payload))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn assign_bed(
        &self,
        bed_id: i64,
        patient_uuid: &str,
        encounter_uuid: Option<&str>,
    ) -> EmrResult<()> {
        let body = serde_json::json!({
            "patientUuid": patient_uuid,
            "encounterUuid": encounter_uuid,
        });
        self.send(
            self.client
                .post(self.rest_url(&format!("beds/{bed_id}")))
                .json(&body),
        )?;
        Ok(())
    }

    fn remove_from_bed(&self, bed_id: i64, patient_uuid: &str) -> EmrResult<()> {
        self.send(
            self.client
                .delete(self.rest_url(&format!("beds/{bed_id}")))
                .query(&[("patientUuid", patient_uuid)]),
        )?;
        Ok(())
    }

    fn assigned_beds(&self, patient_uuid: &str) -> EmrResult<Vec<BedAssignment>> {
        self.get_all(
            &self.rest_url("beds"),
            &[("patientUuid", patient_uuid), ("v", BED_REP)],
        )
    }

    fn patient_bills(
        &self,
        patient_uuid: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> EmrResult<Vec<Bill>> {
        let since = iso(since);
        let until = iso(until);
        let bills: Vec<Bill> = self.get_all(
            &self.rest_url("cashier/bill"),
            &[
                ("v", BILL_REP),
                ("patientUuid", patient_uuid),
                ("createdOnOrAfter", since.as_str()),
                ("createdOnOrBefore", until.as_str()),
            ],
        )?;
        // The cashier endpoint does not always honour the patient filter.
        Ok(bills
            .into_iter()
            .filter(|b| b.patient.as_ref().is_some_and(|p| p.uuid == patient_uuid))
            .collect())
    }
}
